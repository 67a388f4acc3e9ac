//! Task (VTODO) operations.

use std::sync::Arc;

use secretary_core::ical::{self, Component};
use secretary_core::time::{format_ical_date, format_ical_datetime};
use secretary_core::validation::{validate_calendar_name, validate_task_summary};
use secretary_core::{
    DateRange, SecretaryError, SecretaryResult, Task, TaskComplete, TaskCreate, TaskDelete,
    TaskMove, TaskQuery, TaskStatus, TaskStatusChange, TaskUpdate, parse_due_date,
};
use tracing::{debug, info, warn};

use crate::client::{BoxFuture, CalendarInfo, CalendarObject, NewObject, NewTodo, ObjectQuery};
use crate::finder::find_task_by_summary;
use crate::provider::TaskProvider;
use crate::store::CalendarStore;

#[derive(Debug, Clone)]
pub struct TaskService {
    store: Arc<CalendarStore>,
}

impl TaskService {
    pub fn new(store: Arc<CalendarStore>) -> Self {
        Self { store }
    }

    /// Finds the todo called `summary`, completed or not.
    async fn locate(
        &self,
        calendar_name: &str,
        summary: &str,
        action: &str,
    ) -> SecretaryResult<(CalendarInfo, CalendarObject)> {
        let calendar = self.store.find(calendar_name, action).await?;
        let objects = self
            .store
            .objects(&calendar, ObjectQuery::todos(true), action)
            .await?;
        let object = find_task_by_summary(&objects, &calendar.name, summary)?.clone();
        Ok((calendar, object))
    }

    async fn save(&self, object: &CalendarObject, action: &str) -> SecretaryResult<()> {
        self.store
            .client()
            .save(object)
            .await
            .map_err(|e| SecretaryError::operation(action, e))
    }

    /// Marks raw todo text as completed now.
    fn completed(&self, data: &str) -> String {
        let stamp = format_ical_datetime(self.store.now());
        let data = ical::update_property(data, "STATUS", TaskStatus::Completed.as_str(), Component::Todo);
        let data = ical::set_property_line(&data, "COMPLETED", &format!("COMPLETED:{stamp}"), Component::Todo);
        ical::set_property_line(&data, "PERCENT-COMPLETE", "PERCENT-COMPLETE:100", Component::Todo)
    }

    async fn list(&self, query: TaskQuery) -> SecretaryResult<Vec<Task>> {
        const ACTION: &str = "get tasks";
        query.validate()?;
        let today = self.store.today();
        let range = match (query.past_days, query.future_days) {
            (Some(days), _) => Some(DateRange::past_days(today, days)?),
            (_, Some(days)) => Some(DateRange::future_days(today, days)?),
            _ => None,
        };

        let calendars = self.store.select(query.calendar_name.as_deref(), ACTION).await?;
        let mut tasks = Vec::new();
        for calendar in &calendars {
            let objects = match self
                .store
                .client()
                .list_objects(calendar, ObjectQuery::todos(query.include_completed))
                .await
            {
                Ok(objects) => objects,
                Err(e) => {
                    warn!(calendar = %calendar.name, error = %e, "failed to get tasks from calendar, skipping");
                    continue;
                }
            };
            tasks.extend(
                objects
                    .iter()
                    .map(|o| Task::from_ical(&o.data, &calendar.name))
                    .filter(|t| match (range, t.due_date()) {
                        (Some(range), Some(due)) => range.contains(due),
                        _ => true,
                    }),
            );
        }

        debug!(count = tasks.len(), calendars = calendars.len(), "listed tasks");
        Ok(tasks)
    }

    async fn add(&self, request: TaskCreate) -> SecretaryResult<String> {
        const ACTION: &str = "create task";
        let due = request.validate()?;
        let calendar = self.store.find(&request.calendar_name, ACTION).await?;
        let description = request.description.filter(|d| !d.trim().is_empty());

        self.store
            .client()
            .save_new(
                &calendar,
                NewObject::Todo(NewTodo {
                    summary: request.summary.clone(),
                    description: description.clone(),
                    due,
                    status: None,
                }),
            )
            .await
            .map_err(|e| SecretaryError::operation(ACTION, e))?;
        info!(calendar = %calendar.name, summary = %request.summary, "task created");

        let due = due.map(|d| format!(" (due: {d})")).unwrap_or_default();
        let description = description.map(|d| format!(" - {d}")).unwrap_or_default();
        Ok(format!(
            "Task created in '{}': '{}'{due}{description}",
            request.calendar_name, request.summary
        ))
    }

    async fn edit_due(&self, request: TaskUpdate) -> SecretaryResult<String> {
        const ACTION: &str = "update task due date";
        validate_task_summary(&request.summary)?;
        validate_calendar_name(&request.calendar_name)?;
        let due = parse_due_date(request.new_due_date.as_deref())?;

        let (_, object) = self.locate(&request.calendar_name, &request.summary, ACTION).await?;
        let data = match due {
            Some(date) => ical::set_property_line(
                &object.data,
                "DUE",
                &format!("DUE;VALUE=DATE:{}", format_ical_date(date)),
                Component::Todo,
            ),
            None => ical::remove_property(&object.data, "DUE", Component::Todo),
        };
        self.save(&object.with_data(data), ACTION).await?;

        let change = due.map(|d| format!(" to {d}")).unwrap_or_else(|| " (removed)".to_string());
        Ok(format!(
            "Updated due date for '{}' in '{}'{change}",
            request.summary, request.calendar_name
        ))
    }

    async fn complete(&self, request: TaskComplete) -> SecretaryResult<String> {
        const ACTION: &str = "complete task";
        validate_task_summary(&request.summary)?;
        validate_calendar_name(&request.calendar_name)?;

        let (_, object) = self.locate(&request.calendar_name, &request.summary, ACTION).await?;
        if Task::from_ical(&object.data, &request.calendar_name).completed() {
            return Ok(format!(
                "Task '{}' in '{}' is already completed",
                request.summary, request.calendar_name
            ));
        }
        self.save(&object.with_data(self.completed(&object.data)), ACTION).await?;

        Ok(format!(
            "Task '{}' in '{}' marked as completed",
            request.summary, request.calendar_name
        ))
    }

    async fn delete(&self, request: TaskDelete) -> SecretaryResult<String> {
        const ACTION: &str = "delete task";
        validate_task_summary(&request.summary)?;
        validate_calendar_name(&request.calendar_name)?;

        let (_, object) = self.locate(&request.calendar_name, &request.summary, ACTION).await?;
        self.store
            .client()
            .delete(&object)
            .await
            .map_err(|e| SecretaryError::operation(ACTION, e))?;

        Ok(format!(
            "Task '{}' deleted from '{}'",
            request.summary, request.calendar_name
        ))
    }

    async fn relocate(&self, request: TaskMove) -> SecretaryResult<String> {
        const ACTION: &str = "move task";
        request.validate()?;

        let (_, source) = self.locate(&request.source_calendar, &request.summary, ACTION).await?;
        let destination = self.store.find(&request.destination_calendar, ACTION).await?;
        let task = Task::from_ical(&source.data, &request.source_calendar);

        self.store
            .client()
            .save_new(
                &destination,
                NewObject::Todo(NewTodo {
                    summary: task.summary().to_string(),
                    description: task.description().map(str::to_string),
                    due: task.due_date(),
                    status: task.status(),
                }),
            )
            .await
            .map_err(|e| SecretaryError::operation(ACTION, e))?;
        self.store
            .client()
            .delete(&source)
            .await
            .map_err(|e| SecretaryError::operation(ACTION, e))?;
        info!(
            summary = %request.summary,
            from = %request.source_calendar,
            to = %request.destination_calendar,
            "task moved"
        );

        Ok(format!(
            "Task '{}' moved from '{}' to '{}'",
            request.summary, request.source_calendar, request.destination_calendar
        ))
    }

    async fn set_status(&self, request: TaskStatusChange) -> SecretaryResult<String> {
        const ACTION: &str = "change task status";
        validate_task_summary(&request.summary)?;
        validate_calendar_name(&request.calendar_name)?;

        let (_, object) = self.locate(&request.calendar_name, &request.summary, ACTION).await?;
        let data = match request.new_status {
            TaskStatus::Completed => self.completed(&object.data),
            status => {
                let data = ical::update_property(&object.data, "STATUS", status.as_str(), Component::Todo);
                let data = ical::remove_property(&data, "COMPLETED", Component::Todo);
                ical::remove_property(&data, "PERCENT-COMPLETE", Component::Todo)
            }
        };
        self.save(&object.with_data(data), ACTION).await?;

        Ok(format!(
            "Task '{}' in '{}' status changed to '{}'",
            request.summary, request.calendar_name, request.new_status
        ))
    }
}

impl TaskProvider for TaskService {
    fn get_tasks(&self, query: TaskQuery) -> BoxFuture<'_, SecretaryResult<Vec<Task>>> {
        Box::pin(self.list(query))
    }

    fn add_task(&self, request: TaskCreate) -> BoxFuture<'_, SecretaryResult<String>> {
        Box::pin(self.add(request))
    }

    fn edit_due_date(&self, request: TaskUpdate) -> BoxFuture<'_, SecretaryResult<String>> {
        Box::pin(self.edit_due(request))
    }

    fn complete_task(&self, request: TaskComplete) -> BoxFuture<'_, SecretaryResult<String>> {
        Box::pin(self.complete(request))
    }

    fn delete_task(&self, request: TaskDelete) -> BoxFuture<'_, SecretaryResult<String>> {
        Box::pin(self.delete(request))
    }

    fn move_task(&self, request: TaskMove) -> BoxFuture<'_, SecretaryResult<String>> {
        Box::pin(self.relocate(request))
    }

    fn change_task_status(
        &self,
        request: TaskStatusChange,
    ) -> BoxFuture<'_, SecretaryResult<String>> {
        Box::pin(self.set_status(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryClient;
    use chrono::{NaiveDate, TimeZone, Utc};
    use secretary_core::Tz;

    const MILK: &str = "BEGIN:VCALENDAR\nBEGIN:VTODO\nUID:1\nSUMMARY:Buy milk\nDUE;VALUE=DATE:20250712\nEND:VTODO\nEND:VCALENDAR\n";
    const REPORT: &str = "BEGIN:VCALENDAR\nBEGIN:VTODO\nUID:2\nSUMMARY:Write report\nDESCRIPTION:Q3 numbers\nEND:VTODO\nEND:VCALENDAR\n";
    const DONE: &str = "BEGIN:VCALENDAR\nBEGIN:VTODO\nUID:3\nSUMMARY:File taxes\nSTATUS:COMPLETED\nDUE;VALUE=DATE:20250401\nEND:VTODO\nEND:VCALENDAR\n";

    fn setup(client: MemoryClient) -> (Arc<MemoryClient>, TaskService) {
        let client = Arc::new(client);
        let now = Utc.with_ymd_and_hms(2025, 7, 10, 9, 0, 0).unwrap();
        let store = CalendarStore::new(client.clone(), Tz::UTC).with_clock(Arc::new(move || now));
        (client, TaskService::new(Arc::new(store)))
    }

    fn seeded() -> (Arc<MemoryClient>, TaskService) {
        setup(
            MemoryClient::new()
                .with_object("Home", MILK)
                .with_object("Home", DONE)
                .with_object("Work", REPORT)
                .with_calendar("Archive"),
        )
    }

    mod listing {
        use super::*;

        #[tokio::test]
        async fn open_tasks_across_calendars() {
            let (_, service) = seeded();
            let tasks = service.get_tasks(TaskQuery::new()).await.unwrap();
            let summaries: Vec<_> = tasks.iter().map(|t| t.summary()).collect();
            assert_eq!(summaries, ["Buy milk", "Write report"]);
            assert_eq!(tasks[0].due_date(), NaiveDate::from_ymd_opt(2025, 7, 12));
            assert_eq!(tasks[1].calendar_name(), "Work");
        }

        #[tokio::test]
        async fn include_completed_in_one_calendar() {
            let (_, service) = seeded();
            let tasks = service
                .get_tasks(TaskQuery::new().include_completed(true).in_calendar("Home"))
                .await
                .unwrap();
            assert_eq!(tasks.len(), 2);
            assert!(tasks[1].completed());
        }

        #[tokio::test]
        async fn windows_keep_undated_tasks() {
            let (_, service) = seeded();
            let future = service.get_tasks(TaskQuery::new().future_days(3)).await.unwrap();
            assert_eq!(future.len(), 2);

            let future = service.get_tasks(TaskQuery::new().future_days(2)).await.unwrap();
            let summaries: Vec<_> = future.iter().map(|t| t.summary()).collect();
            assert_eq!(summaries, ["Write report"]);

            let past = service
                .get_tasks(TaskQuery::new().past_days(365).include_completed(true))
                .await
                .unwrap();
            let summaries: Vec<_> = past.iter().map(|t| t.summary()).collect();
            assert_eq!(summaries, ["File taxes", "Write report"]);
        }

        #[tokio::test]
        async fn both_windows_fail_before_remote_calls() {
            let (_, service) = setup(MemoryClient::new().with_failing_calendar("Home"));
            let err = service
                .get_tasks(TaskQuery::new().past_days(1).future_days(1))
                .await
                .unwrap_err();
            assert_eq!(
                err,
                SecretaryError::validation("Cannot specify both past_days and future_days filters")
            );
        }

        #[tokio::test]
        async fn failing_calendar_is_skipped() {
            let (_, service) = setup(
                MemoryClient::new()
                    .with_object("Home", MILK)
                    .with_object("Work", REPORT)
                    .with_failing_calendar("Home"),
            );
            let tasks = service.get_tasks(TaskQuery::new()).await.unwrap();
            assert_eq!(tasks.len(), 1);
            assert_eq!(tasks[0].summary(), "Write report");
        }

        #[tokio::test]
        async fn unknown_calendar_is_not_found() {
            let (_, service) = seeded();
            let err = service
                .get_tasks(TaskQuery::new().in_calendar("Gym"))
                .await
                .unwrap_err();
            assert!(matches!(err, SecretaryError::NotFound(_)));
        }
    }

    mod mutations {
        use super::*;

        #[tokio::test]
        async fn add_task_confirms_fields() {
            let (client, service) = seeded();
            let message = service
                .add_task(
                    TaskCreate::new("Call mom", "Home")
                        .with_due_date("2025-07-20")
                        .with_description("Birthday"),
                )
                .await
                .unwrap();
            assert_eq!(message, "Task created in 'Home': 'Call mom' (due: 2025-07-20) - Birthday");
            let stored = client.objects("Home").await;
            assert!(stored[2].data.contains("DUE;VALUE=DATE:20250720"));

            let message = service.add_task(TaskCreate::new("Plain", "Home")).await.unwrap();
            assert_eq!(message, "Task created in 'Home': 'Plain'");
        }

        #[tokio::test]
        async fn add_task_validates_first() {
            let (_, service) = setup(MemoryClient::new().with_failing_writes());
            let err = service.add_task(TaskCreate::new("  ", "Home")).await.unwrap_err();
            assert_eq!(err, SecretaryError::validation("Task summary cannot be empty"));

            let err = service
                .add_task(TaskCreate::new("x", "Home").with_due_date("12/07/2025"))
                .await
                .unwrap_err();
            assert!(err.is_input_error());
        }

        #[tokio::test]
        async fn add_task_wraps_client_errors() {
            let (_, service) = setup(MemoryClient::new().with_calendar("Home").with_failing_writes());
            let err = service.add_task(TaskCreate::new("x", "Home")).await.unwrap_err();
            assert_eq!(
                err.to_string(),
                "Failed to create task: [memory] server_error: write rejected"
            );
        }

        #[tokio::test]
        async fn edit_due_date_sets_and_removes() {
            let (client, service) = seeded();
            let request = TaskUpdate {
                summary: "Buy milk".into(),
                calendar_name: "Home".into(),
                new_due_date: Some("2025-08-01".into()),
            };
            let message = service.edit_due_date(request.clone()).await.unwrap();
            assert_eq!(message, "Updated due date for 'Buy milk' in 'Home' to 2025-08-01");
            let data = &client.objects("Home").await[0].data;
            assert!(data.contains("DUE;VALUE=DATE:20250801\n"));
            assert!(!data.contains("20250712"));

            let message = service
                .edit_due_date(TaskUpdate { new_due_date: None, ..request })
                .await
                .unwrap();
            assert_eq!(message, "Updated due date for 'Buy milk' in 'Home' (removed)");
            assert!(!client.objects("Home").await[0].data.contains("DUE"));
        }

        #[tokio::test]
        async fn complete_sets_completion_fields() {
            let (client, service) = seeded();
            let request = TaskComplete {
                summary: "Buy milk".into(),
                calendar_name: "Home".into(),
            };
            let message = service.complete_task(request).await.unwrap();
            assert_eq!(message, "Task 'Buy milk' in 'Home' marked as completed");

            let data = &client.objects("Home").await[0].data;
            assert!(data.contains("STATUS:COMPLETED\nCOMPLETED:20250710T090000Z\nPERCENT-COMPLETE:100\nEND:VTODO"));
        }

        #[tokio::test]
        async fn complete_reports_already_completed() {
            let (_, service) = seeded();
            let request = TaskComplete {
                summary: "File taxes".into(),
                calendar_name: "Home".into(),
            };
            let message = service.complete_task(request).await.unwrap();
            assert_eq!(message, "Task 'File taxes' in 'Home' is already completed");
        }

        #[tokio::test]
        async fn delete_task_removes_object() {
            let (client, service) = seeded();
            let request = TaskDelete {
                summary: "Write report".into(),
                calendar_name: "Work".into(),
            };
            let message = service.delete_task(request.clone()).await.unwrap();
            assert_eq!(message, "Task 'Write report' deleted from 'Work'");
            assert!(client.objects("Work").await.is_empty());

            let err = service.delete_task(request).await.unwrap_err();
            assert_eq!(err.to_string(), "Task 'Write report' not found in calendar 'Work'");
        }

        #[tokio::test]
        async fn move_preserves_completion() {
            let (client, service) = seeded();
            let message = service
                .move_task(TaskMove {
                    summary: "File taxes".into(),
                    source_calendar: "Home".into(),
                    destination_calendar: "Archive".into(),
                })
                .await
                .unwrap();
            assert_eq!(message, "Task 'File taxes' moved from 'Home' to 'Archive'");

            let moved = client.objects("Archive").await;
            let task = Task::from_ical(&moved[0].data, "Archive");
            assert!(task.completed());
            assert_eq!(task.due_date(), NaiveDate::from_ymd_opt(2025, 4, 1));
            assert_eq!(client.objects("Home").await.len(), 1);
        }

        #[tokio::test]
        async fn move_to_unknown_calendar_keeps_source() {
            let (client, service) = seeded();
            let err = service
                .move_task(TaskMove {
                    summary: "Buy milk".into(),
                    source_calendar: "Home".into(),
                    destination_calendar: "Gym".into(),
                })
                .await
                .unwrap_err();
            assert!(matches!(err, SecretaryError::NotFound(_)));
            assert_eq!(client.objects("Home").await.len(), 2);
        }

        #[tokio::test]
        async fn status_change_round_trip() {
            let (client, service) = seeded();
            let change = |status| TaskStatusChange {
                summary: "Buy milk".into(),
                calendar_name: "Home".into(),
                new_status: status,
            };

            let message = service.change_task_status(change(TaskStatus::Completed)).await.unwrap();
            assert_eq!(message, "Task 'Buy milk' in 'Home' status changed to 'COMPLETED'");
            assert!(client.objects("Home").await[0].data.contains("PERCENT-COMPLETE:100"));

            service.change_task_status(change(TaskStatus::InProcess)).await.unwrap();
            let data = &client.objects("Home").await[0].data;
            assert!(data.contains("STATUS:IN-PROCESS"));
            assert!(!data.contains("COMPLETED"));
        }
    }
}

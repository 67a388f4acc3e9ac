//! Tool catalogue: names, groups, descriptions and argument schemas.
//!
//! Every provider operation is one tool taking a flat object of string,
//! boolean and integer arguments. Arguments are decoded straight into the
//! request types of `secretary-core`; a decoding failure is an invalid
//! params error (-32602).

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use secretary_protocol::{RpcError, ToolDescriptor};

/// A set of tools backed by one provider capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, clap::ValueEnum)]
pub enum ToolGroup {
    Calendar,
    Tasks,
    Events,
    Journals,
}

impl ToolGroup {
    pub const ALL: [ToolGroup; 4] = [Self::Calendar, Self::Tasks, Self::Events, Self::Journals];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calendar => "calendar",
            Self::Tasks => "tasks",
            Self::Events => "events",
            Self::Journals => "journals",
        }
    }
}

impl fmt::Display for ToolGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every tool the server knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    GetCurrentDatetime,
    GetAllCalendarNames,
    CreateNewCalendar,
    GetTasks,
    AddTask,
    EditDueDate,
    CompleteTask,
    DeleteTask,
    MoveTask,
    ChangeTaskStatus,
    GetEvents,
    AddEvent,
    EditEvent,
    DeleteEvent,
    CancelEventInstance,
    ModifyEventInstance,
    CreateJournal,
    GetJournals,
    EditJournal,
    DeleteJournal,
}

impl Tool {
    pub const ALL: [Tool; 20] = [
        Self::GetCurrentDatetime,
        Self::GetAllCalendarNames,
        Self::CreateNewCalendar,
        Self::GetTasks,
        Self::AddTask,
        Self::EditDueDate,
        Self::CompleteTask,
        Self::DeleteTask,
        Self::MoveTask,
        Self::ChangeTaskStatus,
        Self::GetEvents,
        Self::AddEvent,
        Self::EditEvent,
        Self::DeleteEvent,
        Self::CancelEventInstance,
        Self::ModifyEventInstance,
        Self::CreateJournal,
        Self::GetJournals,
        Self::EditJournal,
        Self::DeleteJournal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::GetCurrentDatetime => "get_current_datetime",
            Self::GetAllCalendarNames => "get_all_calendar_names",
            Self::CreateNewCalendar => "create_new_calendar",
            Self::GetTasks => "get_tasks",
            Self::AddTask => "add_task",
            Self::EditDueDate => "edit_due_date",
            Self::CompleteTask => "complete_task",
            Self::DeleteTask => "delete_task",
            Self::MoveTask => "move_task",
            Self::ChangeTaskStatus => "change_task_status",
            Self::GetEvents => "get_events",
            Self::AddEvent => "add_event",
            Self::EditEvent => "edit_event",
            Self::DeleteEvent => "delete_event",
            Self::CancelEventInstance => "cancel_event_instance",
            Self::ModifyEventInstance => "modify_event_instance",
            Self::CreateJournal => "create_journal",
            Self::GetJournals => "get_journals",
            Self::EditJournal => "edit_journal",
            Self::DeleteJournal => "delete_journal",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    /// The group gating this tool. `None` means always available.
    pub fn group(&self) -> Option<ToolGroup> {
        match self {
            Self::GetCurrentDatetime => None,
            Self::GetAllCalendarNames | Self::CreateNewCalendar => Some(ToolGroup::Calendar),
            Self::GetTasks
            | Self::AddTask
            | Self::EditDueDate
            | Self::CompleteTask
            | Self::DeleteTask
            | Self::MoveTask
            | Self::ChangeTaskStatus => Some(ToolGroup::Tasks),
            Self::GetEvents
            | Self::AddEvent
            | Self::EditEvent
            | Self::DeleteEvent
            | Self::CancelEventInstance
            | Self::ModifyEventInstance => Some(ToolGroup::Events),
            Self::CreateJournal | Self::GetJournals | Self::EditJournal | Self::DeleteJournal => {
                Some(ToolGroup::Journals)
            }
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::GetCurrentDatetime => {
                "Get the current date and time in the user's timezone. Use it to resolve relative dates such as 'tomorrow'."
            }
            Self::GetAllCalendarNames => "List the names of all calendars.",
            Self::CreateNewCalendar => "Create a new calendar with the given name.",
            Self::GetTasks => {
                "List tasks, optionally from one calendar. Completed tasks are left out unless include_completed is set. past_days or future_days keep only tasks due in that window (tasks without a due date always pass); they cannot be combined."
            }
            Self::AddTask => {
                "Add a task to a calendar. due_date is YYYY-MM-DD."
            }
            Self::EditDueDate => {
                "Change the due date (YYYY-MM-DD) of a task, or remove it when new_due_date is null."
            }
            Self::CompleteTask => "Mark a task as completed.",
            Self::DeleteTask => "Delete a task.",
            Self::MoveTask => {
                "Move a task to another calendar. The task is recreated in the destination and removed from the source."
            }
            Self::ChangeTaskStatus => {
                "Set the status of a task: NEEDS-ACTION, IN-PROCESS or COMPLETED."
            }
            Self::GetEvents => {
                "List events overlapping a date range, with recurring events expanded. Dates are YYYY-MM-DD or ISO 8601 date-times; a date-only end covers that whole day."
            }
            Self::AddEvent => {
                "Add an event. Start and end are ISO 8601 date-times; rrule is an optional RFC 5545 recurrence rule such as FREQ=WEEKLY;BYDAY=MO."
            }
            Self::EditEvent => {
                "Change an existing event. Only the given fields are changed; an empty new_rrule removes the recurrence and an empty description or location removes that field."
            }
            Self::DeleteEvent => "Delete an event, including all occurrences of a recurring event.",
            Self::CancelEventInstance => {
                "Cancel a single occurrence of a recurring event. instance_date is the date (YYYY-MM-DD) of the occurrence."
            }
            Self::ModifyEventInstance => {
                "Change a single occurrence of a recurring event, leaving the rest of the series as is."
            }
            Self::CreateJournal => {
                "Create a journal entry. The date (YYYY-MM-DD) defaults to today."
            }
            Self::GetJournals => {
                "List journal entries, optionally from one calendar, on one date or within the last past_days days. date and past_days cannot be combined."
            }
            Self::EditJournal => {
                "Append to (default) or replace the description of a journal entry. Give a date when several entries share the summary."
            }
            Self::DeleteJournal => {
                "Delete a journal entry. Give a date when several entries share the summary."
            }
        }
    }

    /// JSON schema of the arguments object.
    pub fn input_schema(&self) -> Value {
        let calendar = string("Exact calendar name");
        let summary = string("Exact summary of the item");
        match self {
            Self::GetCurrentDatetime | Self::GetAllCalendarNames => object(json!({}), &[]),
            Self::CreateNewCalendar => {
                object(json!({ "name": string("Name of the new calendar") }), &["name"])
            }
            Self::GetTasks => object(
                json!({
                    "calendar_name": string("Only list tasks from this calendar"),
                    "future_days": integer("Only tasks due within the next N days"),
                    "include_completed": boolean("Include completed tasks", false),
                    "past_days": integer("Only tasks due within the last N days"),
                }),
                &[],
            ),
            Self::AddTask => object(
                json!({
                    "calendar_name": calendar,
                    "description": string("Longer description"),
                    "due_date": string("Due date, YYYY-MM-DD"),
                    "summary": string("Title of the task"),
                }),
                &["summary", "calendar_name"],
            ),
            Self::EditDueDate => object(
                json!({
                    "calendar_name": calendar,
                    "new_due_date": {
                        "type": ["string", "null"],
                        "description": "New due date, YYYY-MM-DD, or null to remove it",
                    },
                    "summary": summary,
                }),
                &["summary", "calendar_name"],
            ),
            Self::CompleteTask | Self::DeleteTask | Self::DeleteEvent => object(
                json!({ "calendar_name": calendar, "summary": summary }),
                &["summary", "calendar_name"],
            ),
            Self::MoveTask => object(
                json!({
                    "destination_calendar": string("Calendar to move the task to"),
                    "source_calendar": string("Calendar currently holding the task"),
                    "summary": summary,
                }),
                &["summary", "source_calendar", "destination_calendar"],
            ),
            Self::ChangeTaskStatus => object(
                json!({
                    "calendar_name": calendar,
                    "new_status": {
                        "type": "string",
                        "enum": ["NEEDS-ACTION", "IN-PROCESS", "COMPLETED"],
                    },
                    "summary": summary,
                }),
                &["summary", "calendar_name", "new_status"],
            ),
            Self::GetEvents => object(
                json!({
                    "calendar_name": string("Only list events from this calendar"),
                    "end_date": string("End of the range"),
                    "start_date": string("Start of the range"),
                }),
                &["start_date", "end_date"],
            ),
            Self::AddEvent => object(
                json!({
                    "calendar_name": calendar,
                    "description": string("Longer description"),
                    "end_datetime": string("End, ISO 8601"),
                    "location": string("Where the event takes place"),
                    "rrule": string("Recurrence rule, e.g. FREQ=WEEKLY;COUNT=4"),
                    "start_datetime": string("Start, ISO 8601"),
                    "summary": string("Title of the event"),
                }),
                &["summary", "calendar_name", "start_datetime", "end_datetime"],
            ),
            Self::EditEvent => object(
                json!({
                    "calendar_name": calendar,
                    "new_description": string("New description; empty removes it"),
                    "new_end_datetime": string("New end, ISO 8601"),
                    "new_location": string("New location; empty removes it"),
                    "new_rrule": string("New recurrence rule; empty removes it"),
                    "new_start_datetime": string("New start, ISO 8601"),
                    "summary": summary,
                }),
                &["summary", "calendar_name"],
            ),
            Self::CancelEventInstance => object(
                json!({
                    "calendar_name": calendar,
                    "instance_date": string("Date of the occurrence, YYYY-MM-DD"),
                    "summary": summary,
                }),
                &["summary", "calendar_name", "instance_date"],
            ),
            Self::ModifyEventInstance => object(
                json!({
                    "calendar_name": calendar,
                    "instance_date": string("Date of the occurrence, YYYY-MM-DD"),
                    "new_description": string("New description for this occurrence"),
                    "new_end_datetime": string("New end, ISO 8601"),
                    "new_location": string("New location for this occurrence"),
                    "new_start_datetime": string("New start, ISO 8601"),
                    "summary": summary,
                }),
                &["summary", "calendar_name", "instance_date"],
            ),
            Self::CreateJournal => object(
                json!({
                    "calendar_name": calendar,
                    "date": string("Date of the entry, YYYY-MM-DD"),
                    "description": string("Body of the entry"),
                    "summary": string("Title of the entry"),
                }),
                &["calendar_name", "summary", "description"],
            ),
            Self::GetJournals => object(
                json!({
                    "calendar_name": string("Only list entries from this calendar"),
                    "date": string("Only entries on this date, YYYY-MM-DD"),
                    "past_days": integer("Only entries from the last N days"),
                }),
                &[],
            ),
            Self::EditJournal => object(
                json!({
                    "append": boolean("Append to the description instead of replacing it", true),
                    "calendar_name": calendar,
                    "date": string("Date of the entry, YYYY-MM-DD"),
                    "new_description": string("Text to append or the replacement"),
                    "summary": summary,
                }),
                &["summary", "calendar_name", "new_description"],
            ),
            Self::DeleteJournal => object(
                json!({
                    "calendar_name": calendar,
                    "date": string("Date of the entry, YYYY-MM-DD"),
                    "summary": summary,
                }),
                &["summary", "calendar_name"],
            ),
        }
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }

    /// Decodes the arguments object into `T`.
    pub fn decode<T: DeserializeOwned>(&self, arguments: Map<String, Value>) -> Result<T, RpcError> {
        serde_json::from_value(Value::Object(arguments)).map_err(|e| {
            RpcError::invalid_params(format!("Invalid arguments for {}: {e}", self.name()))
        })
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tools available when `groups` are enabled, in catalogue order.
pub fn tools_for(groups: &[ToolGroup]) -> Vec<Tool> {
    Tool::ALL
        .into_iter()
        .filter(|tool| tool.group().is_none_or(|group| groups.contains(&group)))
        .collect()
}

fn object(properties: Value, required: &[&str]) -> Value {
    json!({
        "properties": properties,
        "required": required,
        "type": "object",
    })
}

fn string(description: &str) -> Value {
    json!({ "description": description, "type": "string" })
}

fn integer(description: &str) -> Value {
    json!({ "description": description, "minimum": 1, "type": "integer" })
}

fn boolean(description: &str, default: bool) -> Value {
    json!({ "default": default, "description": description, "type": "boolean" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secretary_core::{TaskCreate, TaskQuery};

    mod catalogue {
        use super::*;

        #[test]
        fn names() {
            let names: Vec<_> = Tool::ALL.iter().map(Tool::name).collect();
            insta::assert_json_snapshot!(names, @r#"
            [
              "get_current_datetime",
              "get_all_calendar_names",
              "create_new_calendar",
              "get_tasks",
              "add_task",
              "edit_due_date",
              "complete_task",
              "delete_task",
              "move_task",
              "change_task_status",
              "get_events",
              "add_event",
              "edit_event",
              "delete_event",
              "cancel_event_instance",
              "modify_event_instance",
              "create_journal",
              "get_journals",
              "edit_journal",
              "delete_journal"
            ]
            "#);
        }

        #[test]
        fn names_round_trip() {
            for tool in Tool::ALL {
                assert_eq!(Tool::from_name(tool.name()), Some(tool));
            }
            assert_eq!(Tool::from_name("get_meetings"), None);
        }

        #[test]
        fn descriptor_shape() {
            insta::assert_json_snapshot!(Tool::CreateNewCalendar.descriptor(), @r#"
            {
              "name": "create_new_calendar",
              "description": "Create a new calendar with the given name.",
              "inputSchema": {
                "properties": {
                  "name": {
                    "description": "Name of the new calendar",
                    "type": "string"
                  }
                },
                "required": [
                  "name"
                ],
                "type": "object"
              }
            }
            "#);
        }

        #[test]
        fn required_fields_are_declared_properties() {
            for tool in Tool::ALL {
                let schema = tool.input_schema();
                let properties = schema["properties"].as_object().unwrap();
                for field in schema["required"].as_array().unwrap() {
                    let field = field.as_str().unwrap();
                    assert!(properties.contains_key(field), "{tool}: {field}");
                }
            }
        }
    }

    mod groups {
        use super::*;

        #[test]
        fn datetime_is_always_available() {
            assert_eq!(tools_for(&[]), vec![Tool::GetCurrentDatetime]);
        }

        #[test]
        fn filters_by_group() {
            let tools = tools_for(&[ToolGroup::Calendar, ToolGroup::Journals]);
            assert_eq!(
                tools.iter().map(Tool::name).collect::<Vec<_>>(),
                vec![
                    "get_current_datetime",
                    "get_all_calendar_names",
                    "create_new_calendar",
                    "create_journal",
                    "get_journals",
                    "edit_journal",
                    "delete_journal",
                ]
            );
            assert_eq!(tools_for(&ToolGroup::ALL).len(), Tool::ALL.len());
        }
    }

    mod decoding {
        use super::*;

        fn args(value: Value) -> Map<String, Value> {
            value.as_object().cloned().unwrap()
        }

        #[test]
        fn decodes_into_requests() {
            let request: TaskCreate = Tool::AddTask
                .decode(args(json!({
                    "summary": "Buy milk",
                    "calendar_name": "Personal",
                    "due_date": "2025-07-12",
                })))
                .unwrap();
            assert_eq!(request, TaskCreate::new("Buy milk", "Personal").with_due_date("2025-07-12"));

            let query: TaskQuery = Tool::GetTasks.decode(Map::new()).unwrap();
            assert_eq!(query, TaskQuery::new());
        }

        #[test]
        fn missing_field_is_invalid_params() {
            let err = Tool::AddTask
                .decode::<TaskCreate>(args(json!({ "summary": "Buy milk" })))
                .unwrap_err();
            assert_eq!(err.code, -32602);
            assert!(err.message.starts_with("Invalid arguments for add_task"));
            assert!(err.message.contains("calendar_name"));
        }

        #[test]
        fn non_integer_days_are_rejected() {
            let err = Tool::GetTasks
                .decode::<TaskQuery>(args(json!({ "past_days": "three" })))
                .unwrap_err();
            assert_eq!(err.code, -32602);

            let err = Tool::GetTasks
                .decode::<TaskQuery>(args(json!({ "past_days": 1.5 })))
                .unwrap_err();
            assert_eq!(err.code, -32602);
        }
    }
}

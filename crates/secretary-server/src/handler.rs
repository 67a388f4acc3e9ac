//! Request/response dispatch.
//!
//! [`Toolbox`] maps tool calls onto the providers; [`RequestHandler`] routes
//! JSON-RPC methods and turns every outcome into a response.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{Span, debug, info, warn};

use secretary_core::{
    EventCreate, EventDelete, EventInstanceCancel, EventInstanceModify, EventQuery, EventUpdate,
    JournalCreate, JournalDelete, JournalEdit, JournalQuery, SecretaryResult, TaskComplete,
    TaskCreate, TaskDelete, TaskMove, TaskQuery, TaskStatus, TaskStatusChange, TaskUpdate, Tz,
};
use secretary_protocol::{
    CallToolParams, CallToolResult, InitializeResult, ListToolsResult, PROTOCOL_VERSION, Request,
    RequestId, Response, RpcError, ServerCapabilities, ServerInfo, ToolDescriptor,
};
use secretary_providers::{
    CalendarProvider, Clock, EventProvider, JournalProvider, ProviderSet, TaskProvider,
};

use crate::error::{ServerError, ServerResult};
use crate::tools::{Tool, ToolGroup, tools_for};

const INSTRUCTIONS: &str = "Manages calendars, tasks, events and journals on the user's calendar server. \
Items are addressed by their exact summary and calendar name; call get_all_calendar_names first when unsure. \
Call get_current_datetime before working with relative dates.";

/// Tool calls routed to the providers of the enabled groups.
#[derive(Clone)]
pub struct Toolbox {
    providers: ProviderSet,
    groups: Vec<ToolGroup>,
    timezone: Tz,
    clock: Clock,
}

impl std::fmt::Debug for Toolbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolbox")
            .field("providers", &self.providers)
            .field("groups", &self.groups)
            .field("timezone", &self.timezone)
            .finish_non_exhaustive()
    }
}

impl Toolbox {
    /// Enables every group that has a provider.
    pub fn new(providers: ProviderSet, timezone: Tz) -> Self {
        let groups = ToolGroup::ALL
            .into_iter()
            .filter(|group| has_provider(&providers, *group))
            .collect();
        Self {
            providers,
            groups,
            timezone,
            clock: Arc::new(Utc::now),
        }
    }

    /// Restricts the tools to `groups`. An empty list keeps every group.
    ///
    /// # Errors
    ///
    /// Fails when a requested group has no provider.
    pub fn with_groups(mut self, groups: &[ToolGroup]) -> ServerResult<Self> {
        if groups.is_empty() {
            return Ok(self);
        }
        if let Some(missing) = groups.iter().find(|g| !has_provider(&self.providers, **g)) {
            return Err(ServerError::missing_provider(missing.as_str()));
        }
        let mut groups = groups.to_vec();
        groups.sort();
        groups.dedup();
        self.groups = groups;
        Ok(self)
    }

    /// Replaces the wall clock used by `get_current_datetime`.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn groups(&self) -> &[ToolGroup] {
        &self.groups
    }

    pub fn tools(&self) -> Vec<Tool> {
        tools_for(&self.groups)
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools().iter().map(Tool::descriptor).collect()
    }

    /// Runs one tool.
    ///
    /// Provider failures come back as results flagged `isError`; only an
    /// unknown tool or undecodable arguments are protocol errors.
    #[tracing::instrument(skip_all, fields(tool = %params.name))]
    pub async fn call(&self, params: CallToolParams) -> Result<CallToolResult, RpcError> {
        let tool = Tool::from_name(&params.name)
            .filter(|tool| self.tools().contains(tool))
            .ok_or_else(|| RpcError::invalid_params(format!("Unknown tool: {}", params.name)))?;

        let start = std::time::Instant::now();
        let result = self.dispatch(tool, params.arguments).await?;
        if result.is_error {
            warn!(error = %result.joined_text(), "Tool failed");
        } else {
            debug!(duration_ms = start.elapsed().as_millis(), "Tool succeeded");
        }
        Ok(result)
    }

    async fn dispatch(
        &self,
        tool: Tool,
        args: Map<String, Value>,
    ) -> Result<CallToolResult, RpcError> {
        match tool {
            Tool::GetCurrentDatetime => records(Ok(self.current_datetime())),

            Tool::GetAllCalendarNames => records(self.calendars()?.get_all_calendar_names().await),
            Tool::CreateNewCalendar => {
                let args: CalendarName = tool.decode(args)?;
                Ok(confirm(self.calendars()?.create_new_calendar(&args.name).await))
            }

            Tool::GetTasks => {
                let query: TaskQuery = tool.decode(args)?;
                records(self.tasks()?.get_tasks(query).await)
            }
            Tool::AddTask => {
                let request: TaskCreate = tool.decode(args)?;
                Ok(confirm(self.tasks()?.add_task(request).await))
            }
            Tool::EditDueDate => {
                let request: TaskUpdate = tool.decode(args)?;
                Ok(confirm(self.tasks()?.edit_due_date(request).await))
            }
            Tool::CompleteTask => {
                let request: TaskComplete = tool.decode(args)?;
                Ok(confirm(self.tasks()?.complete_task(request).await))
            }
            Tool::DeleteTask => {
                let request: TaskDelete = tool.decode(args)?;
                Ok(confirm(self.tasks()?.delete_task(request).await))
            }
            Tool::MoveTask => {
                let request: TaskMove = tool.decode(args)?;
                Ok(confirm(self.tasks()?.move_task(request).await))
            }
            Tool::ChangeTaskStatus => {
                // decoded as text so a bad status reads as a validation error
                let args: StatusArgs = tool.decode(args)?;
                let new_status = match args.new_status.parse::<TaskStatus>() {
                    Ok(status) => status,
                    Err(e) => return Ok(confirm(Err(e))),
                };
                let request = TaskStatusChange {
                    summary: args.summary,
                    calendar_name: args.calendar_name,
                    new_status,
                };
                Ok(confirm(self.tasks()?.change_task_status(request).await))
            }

            Tool::GetEvents => {
                let query: EventQuery = tool.decode(args)?;
                records(self.events()?.get_events(query).await)
            }
            Tool::AddEvent => {
                let request: EventCreate = tool.decode(args)?;
                Ok(confirm(self.events()?.add_event(request).await))
            }
            Tool::EditEvent => {
                let request: EventUpdate = tool.decode(args)?;
                Ok(confirm(self.events()?.edit_event(request).await))
            }
            Tool::DeleteEvent => {
                let request: EventDelete = tool.decode(args)?;
                Ok(confirm(self.events()?.delete_event(request).await))
            }
            Tool::CancelEventInstance => {
                let request: EventInstanceCancel = tool.decode(args)?;
                Ok(confirm(self.events()?.cancel_event_instance(request).await))
            }
            Tool::ModifyEventInstance => {
                let request: EventInstanceModify = tool.decode(args)?;
                Ok(confirm(self.events()?.modify_event_instance(request).await))
            }

            Tool::CreateJournal => {
                let request: JournalCreate = tool.decode(args)?;
                Ok(confirm(self.journals()?.create_journal(request).await))
            }
            Tool::GetJournals => {
                let query: JournalQuery = tool.decode(args)?;
                records(self.journals()?.get_journals(query).await)
            }
            Tool::EditJournal => {
                let request: JournalEdit = tool.decode(args)?;
                Ok(confirm(self.journals()?.edit_journal(request).await))
            }
            Tool::DeleteJournal => {
                let request: JournalDelete = tool.decode(args)?;
                Ok(confirm(self.journals()?.delete_journal(request).await))
            }
        }
    }

    fn current_datetime(&self) -> CurrentDatetime {
        let now = (self.clock)().with_timezone(&self.timezone);
        CurrentDatetime {
            datetime: now.to_rfc3339_opts(SecondsFormat::Secs, false),
            date: now.format("%Y-%m-%d").to_string(),
            time: now.format("%H:%M").to_string(),
            weekday: now.format("%A").to_string(),
            timezone: self.timezone.name().to_string(),
        }
    }

    fn calendars(&self) -> Result<&dyn CalendarProvider, RpcError> {
        self.providers.calendars.as_deref().ok_or_else(|| unavailable(ToolGroup::Calendar))
    }

    fn tasks(&self) -> Result<&dyn TaskProvider, RpcError> {
        self.providers.tasks.as_deref().ok_or_else(|| unavailable(ToolGroup::Tasks))
    }

    fn events(&self) -> Result<&dyn EventProvider, RpcError> {
        self.providers.events.as_deref().ok_or_else(|| unavailable(ToolGroup::Events))
    }

    fn journals(&self) -> Result<&dyn JournalProvider, RpcError> {
        self.providers.journals.as_deref().ok_or_else(|| unavailable(ToolGroup::Journals))
    }
}

fn has_provider(providers: &ProviderSet, group: ToolGroup) -> bool {
    match group {
        ToolGroup::Calendar => providers.calendars.is_some(),
        ToolGroup::Tasks => providers.tasks.is_some(),
        ToolGroup::Events => providers.events.is_some(),
        ToolGroup::Journals => providers.journals.is_some(),
    }
}

fn unavailable(group: ToolGroup) -> RpcError {
    RpcError::internal(format!("no {group} provider is configured"))
}

/// A confirmation string, or the error text flagged `isError`.
fn confirm(result: SecretaryResult<String>) -> CallToolResult {
    match result {
        Ok(message) => CallToolResult::text(message),
        Err(e) => CallToolResult::error(e.to_string()),
    }
}

/// Records as pretty JSON, or the error text flagged `isError`.
fn records<T: Serialize>(result: SecretaryResult<T>) -> Result<CallToolResult, RpcError> {
    match result {
        Ok(records) => CallToolResult::json(&records).map_err(|e| RpcError::internal(e.to_string())),
        Err(e) => Ok(CallToolResult::error(e.to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct CalendarName {
    name: String,
}

#[derive(Debug, Deserialize)]
struct StatusArgs {
    summary: String,
    calendar_name: String,
    new_status: String,
}

#[derive(Debug, Serialize)]
struct CurrentDatetime {
    datetime: String,
    date: String,
    time: String,
    weekday: String,
    timezone: String,
}

/// Routes JSON-RPC requests.
#[derive(Debug, Clone)]
pub struct RequestHandler {
    toolbox: Toolbox,
    server_info: ServerInfo,
}

impl RequestHandler {
    /// Creates a handler reporting `display_name` as its server name.
    pub fn new(toolbox: Toolbox, display_name: impl Into<String>) -> Self {
        Self {
            toolbox,
            server_info: ServerInfo {
                name: display_name.into(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    pub fn toolbox(&self) -> &Toolbox {
        &self.toolbox
    }

    /// Handles one raw line. Returns `None` for notifications.
    pub async fn handle_line(&self, line: &[u8]) -> Option<Response> {
        let value: Value = match serde_json::from_slice(line) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Unparseable message");
                return Some(Response::failure(None, RpcError::parse_error(format!("Parse error: {e}"))));
            }
        };
        let id = value
            .get("id")
            .cloned()
            .and_then(|id| serde_json::from_value::<RequestId>(id).ok());
        let request: Request = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Malformed request");
                return Some(Response::failure(
                    id,
                    RpcError::invalid_request(format!("Invalid request: {e}")),
                ));
            }
        };
        self.handle(&request).await
    }

    /// Handles a single request. Returns `None` for notifications.
    #[tracing::instrument(skip_all, fields(method = %request.method, id, duration_ms))]
    pub async fn handle(&self, request: &Request) -> Option<Response> {
        let Some(id) = request.id.clone() else {
            debug!("Notification received");
            return None;
        };
        Span::current().record("id", tracing::field::display(&id));
        let start = std::time::Instant::now();

        if request.jsonrpc != secretary_protocol::JSONRPC_VERSION {
            return Some(Response::failure(
                Some(id),
                RpcError::invalid_request(format!("Unsupported jsonrpc version '{}'", request.jsonrpc)),
            ));
        }

        let outcome = match request.method.as_str() {
            "initialize" => {
                info!(client = ?request.params.as_ref().and_then(|p| p.get("clientInfo")), "Client initializing");
                to_value(self.initialize())
            }
            "ping" => Ok(json!({})),
            "tools/list" => to_value(ListToolsResult {
                tools: self.toolbox.descriptors(),
            }),
            "tools/call" => match call_params(request.params.clone()) {
                Ok(params) => match self.toolbox.call(params).await {
                    Ok(result) => to_value(result),
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            },
            method => Err(RpcError::method_not_found(method)),
        };

        let duration = start.elapsed();
        if tracing::enabled!(tracing::Level::DEBUG) {
            Span::current().record("duration_ms", duration.as_millis());
            debug!(duration_ms = duration.as_millis(), "Request handled");
        }

        Some(match outcome {
            Ok(result) => Response::success(id, result),
            Err(error) => Response::failure(Some(id), error),
        })
    }

    fn initialize(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities::default(),
            server_info: self.server_info.clone(),
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }
}

fn call_params(params: Option<Value>) -> Result<CallToolParams, RpcError> {
    let params = params.ok_or_else(|| RpcError::invalid_params("Missing params"))?;
    serde_json::from_value(params).map_err(|e| RpcError::invalid_params(format!("Invalid params: {e}")))
}

fn to_value<T: Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::internal(e.to_string()))
}

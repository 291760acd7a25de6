/// Capability definitions and typed tool invocations
///
/// The set of capabilities is closed. Each variant carries its own argument
/// schema, so a call is validated once when it is built from wire data and
/// never re-inspected by name afterwards.

use crate::{database::QueryRows, error::ToolCallError};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;

/// Named operation exposed to the reasoning service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ListTables,
    GetSchema,
    RunQuery,
}

impl Capability {
    pub const ALL: [Capability; 3] = [Self::ListTables, Self::GetSchema, Self::RunQuery];

    /// Wire name used in tool definitions and tool calls
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListTables => "list_tables",
            Self::GetSchema => "get_schema",
            Self::RunQuery => "run_query",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|capability| capability.name() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ListTables => "List the tables available in the database.",
            Self::GetSchema => {
                "Return the schema and a few sample rows for the given tables. \
                 Call list_tables first to be sure the tables exist."
            }
            Self::RunQuery => {
                "Execute a single read-only SQL query and return its rows. If the query \
                 is wrong an error is returned; rewrite the query and try again."
            }
        }
    }

    /// JSON schema of the capability's arguments
    pub fn parameters(&self) -> Value {
        match self {
            Self::ListTables => json!({
                "type": "object",
                "properties": {},
            }),
            Self::GetSchema => json!({
                "type": "object",
                "properties": {
                    "tables": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Names of the tables to describe",
                    }
                },
                "required": ["tables"],
            }),
            Self::RunQuery => json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "A syntactically correct read-only SQL query",
                    }
                },
                "required": ["query"],
            }),
        }
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Tool definition advertised to the reasoning service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A validated request for one capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolInvocation {
    ListTables,
    GetSchema { tables: BTreeSet<String> },
    RunQuery { query: String },
}

impl ToolInvocation {
    /// Build a `run_query` call; an empty query is a construction error
    pub fn run_query(query: impl Into<String>) -> Result<Self, ToolCallError> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(ToolCallError::MissingArgument { capability: "run_query", argument: "query" });
        }
        Ok(Self::RunQuery { query })
    }

    /// Build a `get_schema` call for at least one table
    pub fn get_schema<I, S>(tables: I) -> Result<Self, ToolCallError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tables: BTreeSet<String> = tables
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if tables.is_empty() {
            return Err(ToolCallError::MissingArgument { capability: "get_schema", argument: "tables" });
        }
        Ok(Self::GetSchema { tables })
    }

    /// Build an invocation from a capability name and JSON arguments as emitted
    /// by the reasoning service
    pub fn from_wire(name: &str, arguments: &Value) -> Result<Self, ToolCallError> {
        let capability = Capability::from_name(name)
            .ok_or_else(|| ToolCallError::UnknownCapability(name.to_string()))?;

        match capability {
            Capability::ListTables => Ok(Self::ListTables),
            Capability::GetSchema => match arguments.get("tables") {
                Some(Value::Array(items)) => {
                    let mut tables = Vec::with_capacity(items.len());
                    for item in items {
                        let table = item.as_str().ok_or_else(|| ToolCallError::InvalidArgument {
                            capability: "get_schema",
                            argument: "tables",
                            reason: format!("expected table names, found {}", item),
                        })?;
                        tables.push(table.to_string());
                    }
                    Self::get_schema(tables)
                }
                // Comma separated list, as many models send it
                Some(Value::String(list)) => Self::get_schema(list.split(',')),
                Some(other) => Err(ToolCallError::InvalidArgument {
                    capability: "get_schema",
                    argument: "tables",
                    reason: format!("expected an array of strings, found {}", other),
                }),
                None => Err(ToolCallError::MissingArgument { capability: "get_schema", argument: "tables" }),
            },
            Capability::RunQuery => match arguments.get("query") {
                Some(Value::String(query)) => Self::run_query(query.as_str()),
                Some(other) => Err(ToolCallError::InvalidArgument {
                    capability: "run_query",
                    argument: "query",
                    reason: format!("expected a string, found {}", other),
                }),
                None => Err(ToolCallError::MissingArgument { capability: "run_query", argument: "query" }),
            },
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            Self::ListTables => Capability::ListTables,
            Self::GetSchema { .. } => Capability::GetSchema,
            Self::RunQuery { .. } => Capability::RunQuery,
        }
    }

    pub fn name(&self) -> &'static str {
        self.capability().name()
    }

    /// Arguments in wire form
    pub fn arguments(&self) -> Value {
        match self {
            Self::ListTables => json!({}),
            Self::GetSchema { tables } => json!({ "tables": tables }),
            Self::RunQuery { query } => json!({ "query": query }),
        }
    }

    /// Query text when this is a `run_query` call
    pub fn query(&self) -> Option<&str> {
        match self {
            Self::RunQuery { query } => Some(query),
            _ => None,
        }
    }
}

/// Successful capability output
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Tables(Vec<String>),
    Schema(String),
    Rows(QueryRows),
}

impl ToolOutput {
    /// Text placed in the tool-role message answering the call
    pub fn render(&self) -> String {
        match self {
            Self::Tables(tables) => tables.join(", "),
            Self::Schema(schema) => schema.clone(),
            Self::Rows(rows) => rows.render(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_names_round_trip() {
        for capability in Capability::ALL {
            assert_eq!(Capability::from_name(capability.name()), Some(capability));
        }
        assert_eq!(Capability::from_name("sql_db_query"), None);
    }

    #[test]
    fn run_query_requires_query_text() {
        let err = ToolInvocation::from_wire("run_query", &json!({})).unwrap_err();
        assert_eq!(err, ToolCallError::MissingArgument { capability: "run_query", argument: "query" });

        let err = ToolInvocation::from_wire("run_query", &json!({ "query": "   " })).unwrap_err();
        assert!(matches!(err, ToolCallError::MissingArgument { .. }));

        let err = ToolInvocation::from_wire("run_query", &json!({ "query": 42 })).unwrap_err();
        assert!(matches!(err, ToolCallError::InvalidArgument { .. }));
    }

    #[test]
    fn get_schema_accepts_array_or_comma_list() {
        let from_array = ToolInvocation::from_wire("get_schema", &json!({ "tables": ["invoices"] })).unwrap();
        let from_list = ToolInvocation::from_wire("get_schema", &json!({ "tables": " invoices , " })).unwrap();
        assert_eq!(from_array, from_list);
        assert_eq!(from_array.arguments(), json!({ "tables": ["invoices"] }));
    }

    #[test]
    fn unknown_capability_is_rejected() {
        let err = ToolInvocation::from_wire("drop_everything", &json!({})).unwrap_err();
        assert_eq!(err, ToolCallError::UnknownCapability("drop_everything".to_string()));
    }

    #[test]
    fn invocation_serializes_with_name_and_arguments() {
        let call = ToolInvocation::run_query("SELECT 1").unwrap();
        assert_eq!(
            serde_json::to_value(&call).unwrap(),
            json!({ "name": "run_query", "arguments": { "query": "SELECT 1" } })
        );
        assert_eq!(serde_json::to_value(ToolInvocation::ListTables).unwrap(), json!({ "name": "list_tables" }));
    }
}

#![allow(dead_code)]

use fiscalflow::{
    config::OrchestrationConfig,
    database::{
        invoices::{self, InvoiceRecord},
        SqliteAdapter,
    },
    error::ReasoningProtocolError,
    reasoning::{ReasoningClient, ReasoningRequest},
    runtime::Orchestrator,
    tools::{ToolInvocation, ToolRegistry},
    workflow::{Message, Role, Step, ToolCall},
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

pub const SPEND_QUERY: &str = "SELECT SUM(grand_total) AS total FROM invoices \
     WHERE invoice_date >= '2024-01-01' AND invoice_date < '2025-01-01'";

type Handler = dyn Fn(&ReasoningRequest) -> Result<Message, ReasoningProtocolError> + Send + Sync;

/// In-process reasoning client driven by a closure; records every request
pub struct ScriptedReasoner {
    handler: Box<Handler>,
    requests: Mutex<Vec<ReasoningRequest>>,
}

impl ScriptedReasoner {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&ReasoningRequest) -> Result<Message, ReasoningProtocolError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ReasoningRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn steps(&self) -> Vec<Step> {
        self.requests().iter().map(|request| request.step).collect()
    }
}

#[async_trait]
impl ReasoningClient for ScriptedReasoner {
    async fn complete(&self, request: &ReasoningRequest) -> Result<Message, ReasoningProtocolError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.handler)(request)
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

pub fn call(invocation: ToolInvocation) -> Message {
    Message::assistant_with_calls("", vec![ToolCall::new(invocation)])
}

pub fn query_call(sql: &str) -> Message {
    call(ToolInvocation::run_query(sql).unwrap())
}

pub fn schema_call() -> Message {
    call(ToolInvocation::get_schema(["invoices"]).unwrap())
}

/// Echo the candidate query back as the reviewed call
pub fn echo_check(request: &ReasoningRequest) -> Message {
    query_call(&request.messages[1].content)
}

/// Latest tool message the request carries
pub fn last_tool_message(request: &ReasoningRequest) -> Option<&Message> {
    request.messages.iter().rev().find(|m| m.role == Role::Tool)
}

/// Whether a tool message holds query rows
pub fn is_rows(message: &Message) -> bool {
    message.role == Role::Tool && !message.is_error && message.content.starts_with("{\"columns\"")
}

/// First cell of a rendered query result
pub fn first_cell(message: &Message) -> f64 {
    let rows: serde_json::Value = serde_json::from_str(&message.content).unwrap();
    rows["rows"][0][0].as_f64().unwrap()
}

/// Discover the schema, sum 2024 spend, answer from the rows
pub fn total_spend_script(request: &ReasoningRequest) -> Result<Message, ReasoningProtocolError> {
    match request.step {
        Step::DescribeSchemaRequest => Ok(schema_call()),
        Step::GenerateQuery => match last_tool_message(request) {
            Some(rows) if is_rows(rows) => Ok(Message::assistant(format!(
                "Total spend in 2024 was {:.2}.",
                first_cell(rows)
            ))),
            _ => Ok(query_call(SPEND_QUERY)),
        },
        Step::CheckQuery => Ok(echo_check(request)),
        other => panic!("unexpected reasoning request for {}", other),
    }
}

fn invoice(number: &str, date: &str, seller: &str, total: f64) -> InvoiceRecord {
    InvoiceRecord {
        invoice_number: number.to_string(),
        invoice_date: date.to_string(),
        seller_information: seller.to_string(),
        products_services: "Consulting".to_string(),
        grand_total: total,
        currency: "USD".to_string(),
        ..Default::default()
    }
}

/// In-memory database with three 2024 and two 2023 invoices
pub async fn seeded_adapter() -> SqliteAdapter {
    let adapter = SqliteAdapter::in_memory().await.unwrap();
    invoices::init_schema(adapter.pool()).await.unwrap();
    for record in [
        invoice("INV-2024-001", "2024-02-11", "ACME Corp", 1911.80),
        invoice("INV-2024-002", "2024-06-30", "Globex", 2628.80),
        invoice("INV-2024-003", "2024-11-02", "Initech", 556.50),
        invoice("INV-2023-001", "2023-03-14", "ACME Corp", 104.94),
        invoice("INV-2023-002", "2023-12-01", "Globex", 159.00),
    ] {
        invoices::insert_invoice(adapter.pool(), &record).await.unwrap();
    }
    adapter
}

pub fn config(max_generate_visits: Option<u32>) -> OrchestrationConfig {
    OrchestrationConfig {
        max_generate_visits,
        reasoning_timeout_secs: 5,
        query_timeout_secs: 5,
        ..OrchestrationConfig::default()
    }
}

pub fn orchestrator(
    reasoner: Arc<ScriptedReasoner>,
    adapter: &SqliteAdapter,
    max_generate_visits: Option<u32>,
) -> Orchestrator {
    let tools = Arc::new(ToolRegistry::new(Arc::new(adapter.clone())));
    Orchestrator::new(reasoner, tools, &config(max_generate_visits)).unwrap()
}

/// System prompts for the reasoning steps
///
/// Rendered once per orchestrator from the adapter's dialect and the
/// configured result limit.

/// Mistakes the checking step looks for before a query is executed
pub const QUERY_PITFALLS: [&str; 8] = [
    "NOT IN against a subquery or column that may contain NULL",
    "UNION where UNION ALL was intended",
    "BETWEEN used for a range that should exclude an endpoint",
    "predicates comparing values of mismatched types",
    "identifiers that need quoting but are not quoted",
    "functions called with the wrong number of arguments",
    "missing or incorrect casts",
    "joins on the wrong columns",
];

#[derive(Debug, Clone)]
pub struct PromptSet {
    dialect: String,
    top_k: u32,
}

impl PromptSet {
    pub fn new(dialect: impl Into<String>, top_k: u32) -> Self {
        Self { dialect: dialect.into(), top_k }
    }

    pub fn dialect(&self) -> &str {
        &self.dialect
    }

    /// Instructions for the query-writing step
    pub fn generate_query(&self) -> String {
        format!(
            "You answer questions about a SQL database of invoices.\n\
             For each question, write one syntactically correct {dialect} query, call the \
             run_query tool with it, read the rows that come back and answer in plain, \
             friendly language.\n\
             Unless the question asks for a specific number of rows, limit the query to at \
             most {top_k} results. Order by a relevant column so the most useful rows come \
             first. Select only the columns the question needs, never every column of a table.\n\
             If a query fails, read the error, fix the query and call run_query again.\n\
             Never issue statements that change the database (INSERT, UPDATE, DELETE, DROP, \
             ALTER, CREATE and similar). Only read-only queries are allowed.",
            dialect = self.dialect,
            top_k = self.top_k,
        )
    }

    /// Instructions for the query-review step
    pub fn check_query(&self) -> String {
        let pitfalls: String = QUERY_PITFALLS
            .iter()
            .map(|pitfall| format!("- {}\n", pitfall))
            .collect();

        format!(
            "You review {dialect} queries before they run. Look for these mistakes:\n\
             {pitfalls}\n\
             If you find one, rewrite the query to fix it. If the query is fine, reproduce it \
             exactly.\n\
             Always finish by calling the run_query tool with the final query.",
            dialect = self.dialect,
            pitfalls = pitfalls,
        )
    }
}

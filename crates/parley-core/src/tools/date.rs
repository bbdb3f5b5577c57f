use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::errors::AgentError;
use crate::llm::ToolMetadata;
use crate::tools::Tool;

/// Source of "today" for the date tool.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Returns today's local date, e.g. `October 16, 2026`. Arguments are ignored.
pub struct DateTool {
    clock: Arc<dyn Clock>,
}

impl DateTool {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn formatted_today(&self) -> String {
        self.clock.today().format("%B %d, %Y").to_string()
    }
}

impl Default for DateTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for DateTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "date".to_string(),
            description: "Get the current date".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    async fn execute(&self, _arguments: Value) -> Result<String, AgentError> {
        Ok(self.formatted_today())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(y: i32, m: u32, d: u32) -> DateTool {
        DateTool::with_clock(Arc::new(FixedClock(NaiveDate::from_ymd_opt(y, m, d).unwrap())))
    }

    #[tokio::test]
    async fn test_date_format() {
        let tool = fixed(2026, 10, 16);
        assert_eq!(tool.execute(json!({})).await.unwrap(), "October 16, 2026");
    }

    #[tokio::test]
    async fn test_single_digit_day_is_zero_padded() {
        let tool = fixed(2025, 3, 4);
        assert_eq!(tool.execute(Value::Null).await.unwrap(), "March 04, 2025");
    }

    #[tokio::test]
    async fn test_arguments_are_ignored() {
        let tool = fixed(2024, 1, 31);
        let output = tool.execute(json!({"timezone": "UTC", "anything": 1})).await.unwrap();
        assert_eq!(output, "January 31, 2024");
    }

    #[test]
    fn test_metadata_takes_no_parameters() {
        let metadata = DateTool::new().metadata();
        assert_eq!(metadata.name, "date");
        assert_eq!(metadata.input_schema["properties"], json!({}));
    }
}

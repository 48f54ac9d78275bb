// Insight extraction prompt templates.

pub const INSIGHTS_PROMPT_TEMPLATE: &str = r#"Analyze these Reddit post titles and extract key insights:

{titles}

Provide:
1. Main trends or patterns
2. Common topics discussed
3. Brief summary of community interest

Respond with JSON:
{
  "summary": "one or two sentences",
  "trends": ["trend1", "trend2"],
  "topics": ["topic1", "topic2"]
}

{json_only}"#;

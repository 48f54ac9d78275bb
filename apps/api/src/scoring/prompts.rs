// Relevance scoring prompt templates.

/// Longest body excerpt sent to the oracle, in characters.
pub const BODY_EXCERPT_CHARS: usize = 500;

pub const RELEVANCE_PROMPT_TEMPLATE: &str = r#"Analyze this Reddit post for relevance and quality.

Keywords of interest: {keywords}

Post Title: {title}
Post Content: {body}...
Score: {score}
Comments: {num_comments}

Evaluate based on:
1. Relevance to keywords
2. Content quality (signs of quality: {quality_indicators})
3. Community engagement (score, comments)
4. Not spam or low-effort content (warning signs: {negative_indicators})

Respond with JSON:
{
  "relevance_score": 0.0-1.0,
  "quality_score": 0.0-1.0,
  "reason": "brief explanation",
  "key_insights": ["insight1", "insight2"]
}

{json_only}"#;

//! Prompt templates for the research and chart-code stages.

use crate::types::ChatMessage;

/// System prompt for the research stage.
pub const RESEARCH_SYSTEM_PROMPT: &str = "\
You are a research specialist. Analyze the query and provide structured data that can be used for visualization.

If you have search results, extract numerical data. If not, provide typical/example data that would answer the query.

Format your response as:
1. Data Summary
2. Key Numbers/Statistics
3. Recommended Chart Type
4. Data Structure for Visualization

Be specific with numbers, dates, and sources when available.";

/// System prompt for the chart-code stage.
pub const CHART_CODE_SYSTEM_PROMPT: &str = "\
You are a data visualization expert. Create complete, runnable Python code using matplotlib that users can copy and run locally.

Your code must include:
1. All necessary imports (matplotlib.pyplot as plt, pandas as pd, numpy as np)
2. Data setup (create sample data if needed)
3. Professional chart creation with proper styling
4. Clear labels, titles, and formatting
5. plt.show() at the end

Choose the appropriate chart type (line, bar, scatter, pie, etc.) based on the data and query.

Make the code self-contained and ready to run.";

/// Messages for the research call: the query and search text, verbatim.
pub fn research_messages(query: &str, search_text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(RESEARCH_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Query: {query}\n\nSearch Results: {search_text}\n\nPlease provide structured data for visualization."
        )),
    ]
}

/// Messages for the chart-code call: the query and research text, verbatim.
pub fn chart_code_messages(query: &str, research: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(CHART_CODE_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Original Query: {query}\n\nResearch Data: {research}\n\nCreate complete Python visualization code."
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn test_research_messages_embed_inputs() {
        let msgs = research_messages("UK GDP past 3 years", "Summary: GDP grew");
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::System);
        assert!(msgs[0].content.contains("Recommended Chart Type"));
        assert_eq!(msgs[1].role, Role::User);
        assert_eq!(
            msgs[1].content,
            "Query: UK GDP past 3 years\n\nSearch Results: Summary: GDP grew\n\n\
             Please provide structured data for visualization."
        );
    }

    #[test]
    fn test_chart_code_messages_embed_inputs() {
        let msgs = chart_code_messages("q", "1. Data Summary\n...");
        assert_eq!(msgs[0].content, CHART_CODE_SYSTEM_PROMPT);
        assert!(msgs[0].content.contains("plt.show()"));
        assert!(msgs[1].content.starts_with("Original Query: q\n\n"));
        assert!(msgs[1].content.contains("Research Data: 1. Data Summary\n..."));
    }
}

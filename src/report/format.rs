//! Transcript message formatting.
//!
//! Every stage posts a framed, timestamped message to the run transcript.
//! The synthesis stage reads these messages back as its context.

use chrono::Utc;

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Frame one analyst's output.
pub fn format_analysis_output(title: &str, content: &str, analyst: &str) -> String {
    let separator = "=".repeat(60);
    format!(
        "{sep}\n📊 {title}\n👤 Analyst: {analyst}\n⏰ Time: {time}\n{sep}\n\n{content}\n\n{sep}\n",
        sep = separator,
        title = title,
        analyst = analyst,
        time = timestamp(),
        content = content.trim_end(),
    )
}

/// Frame the combined peer review output.
pub fn format_review_output(reviews: &[String]) -> String {
    let separator = "=".repeat(60);
    let mut output = format!(
        "{sep}\n🔍 Peer Review\n⏰ Time: {time}\n{sep}\n\n",
        sep = separator,
        time = timestamp()
    );

    for (i, review) in reviews.iter().enumerate() {
        output.push_str(&format!("📝 Review {}:\n{}\n\n", i + 1, review.trim_end()));
    }

    output.push_str(&separator);
    output.push('\n');
    output
}

/// Frame the final synthesized report.
pub fn format_final_report(content: &str) -> String {
    let separator = "=".repeat(80);
    format!(
        "{sep}\n🎯 Final Consolidated Investment Report\n📈 Multi-analyst collaboration\n⏰ Time: {time}\n{sep}\n\n{content}\n\n{sep}\n✅ Report complete - built on specialist analysis and peer review\n{sep}\n",
        sep = separator,
        time = timestamp(),
        content = content.trim_end(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_analysis_output() {
        let output = format_analysis_output("Risk Assessment Report", "Beta 1.2", "Risk Analyst");
        assert!(output.contains("Risk Assessment Report"));
        assert!(output.contains("Analyst: Risk Analyst"));
        assert!(output.contains("Beta 1.2"));
        assert!(output.starts_with(&"=".repeat(60)));
    }

    #[test]
    fn test_format_review_output_numbers_reviews() {
        let output = format_review_output(&["first".to_string(), "second".to_string()]);
        assert!(output.contains("📝 Review 1:\nfirst"));
        assert!(output.contains("📝 Review 2:\nsecond"));
    }

    #[test]
    fn test_format_final_report() {
        let output = format_final_report("Rating: Outperform");
        assert!(output.contains("Final Consolidated Investment Report"));
        assert!(output.contains("Rating: Outperform"));
        assert!(output.contains(&"=".repeat(80)));
    }
}

//! Offline analyst.
//!
//! Answers without a model server by assembling the role's fact lookups
//! into a fixed report layout. Useful for demos and for exercising the
//! workflow end to end.

use crate::analyst::capabilities::FactLookups;
use crate::analyst::Analyst;
use crate::errors::CapabilityError;
use crate::models::{Capability, CapabilitySet, Role};
use async_trait::async_trait;

/// Deterministic analyst backed only by the mocked lookups.
#[derive(Debug, Clone, Default)]
pub struct OfflineAnalyst {
    lookups: FactLookups,
}

impl OfflineAnalyst {
    pub fn new() -> Self {
        Self {
            lookups: FactLookups::new(),
        }
    }

    fn body(&self, role: Role, subject: &str, capabilities: CapabilitySet) -> String {
        match role {
            Role::Fundamental => format!(
                "Valuation looks reasonable relative to growth.\n\n{}\n{}",
                self.lookups.stock_data(subject, "1y"),
                self.lookups.financial_news(subject, 7)
            ),
            Role::Technical => format!(
                "The trend is constructive while price holds above support.\n\n{}",
                self.lookups.technical_indicators(subject, "MA")
            ),
            Role::Risk => {
                let mut text = String::from("Risk is moderate with elevated sector concentration.\n\n");
                if capabilities.allows(Capability::RiskAssessment) {
                    text.push_str(&self.lookups.risk_assessment("standard", "50B"));
                    text.push('\n');
                    text.push_str(&self.lookups.portfolio_optimization("equities, bonds, cash", "medium"));
                }
                text
            }
            Role::Senior => format!(
                "Executive summary: the panel's views are broadly aligned.\n\
                 Recommendation: accumulate on pullbacks toward support.\n\
                 Key risks: sector concentration and above-market beta.\n\
                 Rating: Outperform, target 150.\n\
                 Agreement: fundamental, technical and risk views agree on direction.\n\n{}\n{}",
                self.lookups.stock_data(subject, "1y"),
                self.lookups.risk_assessment("standard", "50B")
            ),
        }
    }
}

#[async_trait]
impl Analyst for OfflineAnalyst {
    async fn invoke(
        &self,
        role: Role,
        task: &str,
        capabilities: CapabilitySet,
    ) -> Result<String, CapabilityError> {
        let subject = task
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("the requested security");

        Ok(format!(
            "{} view on: {}\n\n{}\nSuggestions:\n- Cross-check the figures against the latest filings\n- State the assumptions behind each conclusion\n",
            role.title(),
            subject,
            self.body(role, subject, capabilities)
        ))
    }

    fn name(&self) -> &str {
        "offline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_reports_are_role_specific() {
        let analyst = OfflineAnalyst::new();

        let technical = analyst
            .invoke(Role::Technical, "Evaluate Company X", CapabilitySet::Base)
            .await
            .unwrap();
        assert!(technical.contains("Technical Analyst view on: Evaluate Company X"));
        assert!(technical.contains("MACD"));

        let risk = analyst
            .invoke(Role::Risk, "Evaluate Company X", CapabilitySet::Extended)
            .await
            .unwrap();
        assert!(risk.contains("VaR"));
        assert!(risk.contains("Suggestions:"));
    }

    #[tokio::test]
    async fn test_offline_synthesis_clears_quality_bar() {
        let analyst = OfflineAnalyst::new();
        let report = analyst
            .invoke(Role::Senior, "Produce the final report", CapabilitySet::Extended)
            .await
            .unwrap();
        assert!(report.chars().count() > 500);
        assert!(report.contains("Rating"));
    }
}

// ABOUTME: Planning policy: turns a user query into an ordered plan of tool steps with bindings.
// ABOUTME: Fixed pipeline by default; the adaptive mode skips charts for single-value questions.

use flightdeck_core::{Binding, Plan, PlanStep, ToolName, fields};

use crate::tools::ToolRegistry;

/// Phrases that signal a single-value answer.
const SCALAR_PHRASES: [&str; 8] = [
    "how many",
    "what is the total",
    "what is the average",
    "what's the total",
    "what's the average",
    "count of",
    "total number of",
    "average number of",
];

/// Words that signal the user wants a chart regardless.
const CHART_WORDS: [&str; 9] = [
    "chart", "plot", "graph", "visual", "trend", "over time", "by ", "per ", "each",
];

/// How the orchestrator chooses a plan. Planning is a pure function of the
/// query and the registered tools; no model call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlanningPolicy {
    /// Insert analyze_data after execute_sql.
    pub include_analysis: bool,
    /// Skip create_visualization for questions asking for a single value.
    pub adaptive: bool,
}

impl PlanningPolicy {
    pub fn fixed() -> Self {
        Self::default()
    }

    /// Returns the reason to skip charting, if this query asks for a single
    /// value and says nothing about charts or breakdowns.
    pub fn scalar_reason(query: &str) -> Option<&'static str> {
        let lower = query.to_lowercase();
        let phrase = SCALAR_PHRASES.iter().find(|p| lower.contains(*p))?;
        if CHART_WORDS.iter().any(|w| lower.contains(w)) {
            return None;
        }
        tracing::debug!(phrase, "query asks for a single value");
        Some("query asks for a single value")
    }

    /// Build the plan for `query`. Essential tools are always included;
    /// plan validation reports them as not found if they are unregistered.
    /// Optional tools missing from the registry are skipped and recorded.
    pub fn plan(&self, query: &str, registry: &ToolRegistry) -> Plan {
        let mut plan = Plan::new();

        let generate = plan.push(
            PlanStep::new(ToolName::GenerateSql)
                .bind(fields::NATURAL_LANGUAGE_QUERY, Binding::UserQuery)
                .bind(fields::CONVERSATION_CONTEXT, Binding::History),
        );
        let execute = plan.push(
            PlanStep::new(ToolName::ExecuteSql)
                .bind(fields::SQL_QUERY, Binding::output(generate, fields::SQL_QUERY)),
        );

        let optional = |plan: &mut Plan, step: PlanStep| {
            if registry.contains(step.tool) {
                plan.push(step);
            } else {
                plan.skip(step.tool, "not registered");
            }
        };

        if self.include_analysis {
            optional(
                &mut plan,
                PlanStep::new(ToolName::AnalyzeData)
                    .bind(fields::ROWS, Binding::output(execute, fields::ROWS))
                    .bind(fields::NATURAL_LANGUAGE_QUERY, Binding::UserQuery)
                    .bind(fields::ROWS_SUMMARY, Binding::output(execute, fields::SUMMARY)),
            );
        }

        let scalar = if self.adaptive {
            Self::scalar_reason(query)
        } else {
            None
        };
        match scalar {
            Some(reason) => plan.skip(ToolName::CreateVisualization, reason),
            None => optional(
                &mut plan,
                PlanStep::new(ToolName::CreateVisualization)
                    .bind(fields::ROWS, Binding::output(execute, fields::ROWS))
                    .bind(fields::NATURAL_LANGUAGE_QUERY, Binding::UserQuery),
            ),
        }

        optional(
            &mut plan,
            PlanStep::new(ToolName::SuggestFollowUps)
                .bind(fields::NATURAL_LANGUAGE_QUERY, Binding::UserQuery)
                .bind(fields::ROWS_SUMMARY, Binding::output(execute, fields::SUMMARY)),
        );

        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FnTool;
    use serde_json::json;
    use std::sync::Arc;

    fn registry(names: &[ToolName]) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for name in names {
            registry.register(Arc::new(FnTool::ok(*name, json!({})))).unwrap();
        }
        registry
    }

    fn all_tools() -> ToolRegistry {
        registry(&ToolName::ALL)
    }

    #[test]
    fn default_plan_is_fixed_pipeline() {
        let registry = all_tools();
        let plan = PlanningPolicy::fixed()
            .plan("What are the top 5 carriers by number of flights?", &registry);

        assert_eq!(
            plan.tool_names(),
            vec![
                ToolName::GenerateSql,
                ToolName::ExecuteSql,
                ToolName::CreateVisualization,
                ToolName::SuggestFollowUps,
            ]
        );
        assert!(plan.skipped.is_empty());
        assert_eq!(plan.validate(&registry.list()), Ok(()));
    }

    #[test]
    fn analysis_is_inserted_after_execute_sql() {
        let registry = all_tools();
        let policy = PlanningPolicy {
            include_analysis: true,
            adaptive: false,
        };
        let plan = policy.plan("Top carriers", &registry);
        assert_eq!(plan.tool_names()[2], ToolName::AnalyzeData);
        assert_eq!(plan.steps.len(), 5);
        assert_eq!(plan.validate(&registry.list()), Ok(()));
    }

    #[test]
    fn fixed_policy_never_skips_visualization() {
        let plan = PlanningPolicy::fixed()
            .plan("How many flights departed from JFK in January?", &all_tools());
        assert!(plan.contains(ToolName::CreateVisualization));
    }

    #[test]
    fn adaptive_policy_skips_visualization_for_scalar_questions() {
        let policy = PlanningPolicy {
            include_analysis: false,
            adaptive: true,
        };
        let plan = policy.plan("How many flights departed from JFK in January?", &all_tools());

        assert!(!plan.contains(ToolName::CreateVisualization));
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].tool, ToolName::CreateVisualization);
        assert_eq!(plan.skipped[0].reason, "query asks for a single value");
    }

    #[test]
    fn adaptive_policy_keeps_chart_when_breakdown_requested() {
        let policy = PlanningPolicy {
            include_analysis: false,
            adaptive: true,
        };
        let plan = policy.plan("How many flights per month?", &all_tools());
        assert!(plan.contains(ToolName::CreateVisualization));

        let plan = policy.plan("Plot how many flights each carrier had", &all_tools());
        assert!(plan.contains(ToolName::CreateVisualization));
    }

    #[test]
    fn unregistered_optional_tools_are_skipped() {
        let registry = registry(&[ToolName::GenerateSql, ToolName::ExecuteSql]);
        let policy = PlanningPolicy {
            include_analysis: true,
            adaptive: false,
        };
        let plan = policy.plan("Top carriers", &registry);

        assert_eq!(plan.tool_names(), vec![ToolName::GenerateSql, ToolName::ExecuteSql]);
        let skipped: Vec<ToolName> = plan.skipped.iter().map(|s| s.tool).collect();
        assert_eq!(
            skipped,
            vec![
                ToolName::AnalyzeData,
                ToolName::CreateVisualization,
                ToolName::SuggestFollowUps,
            ]
        );
        assert!(plan.skipped.iter().all(|s| s.reason == "not registered"));
        assert_eq!(plan.validate(&registry.list()), Ok(()));
    }

    #[test]
    fn missing_essential_tool_fails_validation() {
        let registry = registry(&[ToolName::GenerateSql]);
        let plan = PlanningPolicy::fixed().plan("Top carriers", &registry);
        let err = plan.validate(&registry.list()).unwrap_err();
        assert!(err.to_string().contains("tool not found: execute_sql"));
    }

    #[test]
    fn scalar_reason_is_deterministic() {
        assert!(PlanningPolicy::scalar_reason("What is the average arrival delay?").is_some());
        assert!(PlanningPolicy::scalar_reason("Count of planes with 4 engines").is_some());
        assert!(PlanningPolicy::scalar_reason("Top 5 destinations").is_none());
        assert!(PlanningPolicy::scalar_reason("What is the average delay by carrier?").is_none());
    }
}

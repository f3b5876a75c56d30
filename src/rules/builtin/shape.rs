//! Rules about the shape of the lockfile graph

use crate::domain::{Finding, Severity};
use crate::error::RuleFault;
use crate::rules::{GraphRule, ParamKind, ParamValue, RuleContext, RuleSettings};

/// No package may sit deeper than `value` levels below a manifest
pub struct MaxDepth;

impl GraphRule for MaxDepth {
    fn id(&self) -> &str {
        "max-depth"
    }

    fn description(&self) -> &str {
        "Disallow dependency chains deeper than a limit"
    }

    fn defaults(&self) -> RuleSettings {
        RuleSettings::new(Severity::Warning)
            .with_parameter("value", ParamValue::Number(10.0))
            .disabled()
    }

    fn parameters(&self) -> &'static [(&'static str, ParamKind)] {
        &[("value", ParamKind::Number)]
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleFault> {
        let limit = ctx.number("value")?;
        Ok(ctx
            .graph
            .nodes()
            .filter_map(|(id, node)| {
                let depth = ctx.graph.depth(id)?;
                (depth as f64 > limit).then(|| {
                    ctx.node_finding(
                        id,
                        format!("{} is {} levels deep, limit is {}", node.name, depth, limit),
                    )
                })
            })
            .collect())
    }
}

/// Packages must not depend on each other in a cycle
pub struct NoCycles;

impl GraphRule for NoCycles {
    fn id(&self) -> &str {
        "no-cycles"
    }

    fn description(&self) -> &str {
        "Disallow dependency cycles"
    }

    fn defaults(&self) -> RuleSettings {
        RuleSettings::new(Severity::Warning).disabled()
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, RuleFault> {
        let mut findings = Vec::new();
        for group in ctx.graph.strongly_connected_groups() {
            let Some(&first) = group.first() else {
                continue;
            };
            let names: Vec<&str> = group
                .iter()
                .filter_map(|id| ctx.graph.node(*id))
                .map(|node| node.name.as_str())
                .collect();
            let message = if names.len() == 1 {
                format!("{} depends on itself", names[0])
            } else {
                format!("dependency cycle between {}", names.join(", "))
            };
            findings.push(ctx.node_finding(first, message));
        }
        Ok(findings)
    }
}

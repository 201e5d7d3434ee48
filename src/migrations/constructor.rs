//! Constructor signature checks.
//!
//! Library classes whose constructors changed are listed in the registry with
//! their new signatures. Calls that match none of them cannot be fixed
//! mechanically, so each one becomes an action-required diagnostic.

use tracing::debug;

use uplift_core::rules::RuleCategory;
use uplift_ts::SignatureChecker;

use super::{FileContext, MigrationUnit, RunContext, Script};

/// Reports `new C(...)` and `super(...)` calls with outdated arguments.
#[derive(Debug, Clone, Copy)]
pub struct ConstructorSignatures;

impl MigrationUnit for ConstructorSignatures {
    fn name(&self) -> &'static str {
        "constructor-signatures"
    }

    fn categories(&self) -> &[RuleCategory] {
        &[RuleCategory::ConstructorSignature]
    }

    fn visit_script(&self, cx: &RunContext<'_>, script: &Script<'_, '_>, out: &mut FileContext) {
        if !cx.registry.has_category(RuleCategory::ConstructorSignature) {
            return;
        }
        let checker = SignatureChecker::new(cx.registry, script.resolver);
        for mismatch in checker.check(script.root, script.source()) {
            debug!(
                file = out.path(),
                class = %mismatch.class_name,
                "constructor signature mismatch"
            );
            out.action_required(mismatch.span, mismatch.message);
        }
    }
}

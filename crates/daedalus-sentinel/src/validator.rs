//! Structural integrity checks over the registration map.
//!
//! Everything here returns findings, never errors: naming violations,
//! unresolved dependencies, cycles, and priority conflicts come back as
//! tagged [`Severity`] values inside a [`ValidationReport`] so a batch audit
//! surfaces every problem at once and callers decide policy (a typical one:
//! refuse to deploy on any error-severity finding).
//!
//! The registration-time checks in the store are the strict gate; this
//! module is the broader audit and may report violations that arrived
//! through unusual mutation paths. Both share the same name predicate so
//! they cannot drift.

use daedalus_core::error::{Severity, ValidationError};
use daedalus_core::types::{
    is_valid_name, ApplicationContext, MiddlewareRegistration, MAX_NAME_LENGTH, MAX_PRIORITY,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Flagging threshold for the high-priority recommendation.
const HIGH_PRIORITY_THRESHOLD: u8 = 80;
const HIGH_PRIORITY_LIMIT: usize = 5;

/// A closed loop in the dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyCycle {
    /// The names forming the loop, starting from the lexicographically
    /// smallest member.
    pub middleware_names: Vec<String>,
    /// Number of edges in the loop.
    pub cycle_length: usize,
    /// Cycles always break chain-ordering guarantees.
    pub severity: Severity,
}

/// Two units sharing a priority value and an application context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityConflict {
    /// First unit (registration order).
    pub middleware_a: String,
    /// Second unit.
    pub middleware_b: String,
    /// The shared priority.
    pub priority: u8,
    /// The context both units declare.
    pub context: ApplicationContext,
    /// Conflicts are advisory: the executor breaks ties deterministically.
    pub severity: Severity,
}

/// Removal-safety audit result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalCheck {
    /// `true` iff no registration directly depends on the name.
    pub can_remove: bool,
    /// Registrations listing the name as a dependency.
    pub direct_dependents: Vec<String>,
    /// Registrations reachable through the dependents graph (surfaced for
    /// awareness; they never block removal on their own).
    pub transitive_dependents: Vec<String>,
    /// Human-readable notes.
    pub warnings: Vec<String>,
}

/// Aggregate numbers over the whole registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationStatistics {
    /// Total registrations.
    pub total_middleware: usize,
    /// Enabled registrations.
    pub enabled_count: usize,
    /// Disabled registrations.
    pub disabled_count: usize,
    /// Sum of declared dependencies.
    pub total_dependencies: usize,
    /// Declared dependencies that name no registration.
    pub unresolved_dependencies: usize,
    /// Mean priority across all registrations.
    pub average_priority: f64,
    /// Distinct application contexts in use.
    pub contexts_used: usize,
    /// Units in the security/authentication/authorization categories.
    pub security_middleware_count: usize,
    /// Bounded 0–100 heuristic:
    /// `min(100, 2·total + 5·unresolved + 3·security)`.
    pub performance_impact_score: u32,
}

/// Result of a full-registry audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// `true` iff no error-severity finding and no error-severity cycle.
    pub valid: bool,
    /// Per-registration findings.
    pub errors: Vec<ValidationError>,
    /// Dependency cycles.
    pub cycles: Vec<DependencyCycle>,
    /// Priority conflicts.
    pub conflicts: Vec<PriorityConflict>,
    /// Aggregate numbers.
    pub statistics: ValidationStatistics,
    /// Qualitative guidance derived from the findings.
    pub recommendations: Vec<String>,
}

/// Validates a candidate name against format rules and an existing name set.
#[must_use]
pub fn validate_name(name: &str, existing_names: &BTreeSet<String>) -> Vec<ValidationError> {
    let mut findings = Vec::new();

    if name.is_empty() {
        findings.push(ValidationError::error(
            "name",
            "middleware name must not be empty",
            "EMPTY_NAME",
        ));
        return findings;
    }
    if !is_valid_name(name) {
        findings.push(
            ValidationError::error(
                "name",
                "middleware names may only contain [a-zA-Z0-9_-]",
                "INVALID_NAME_FORMAT",
            )
            .with_value(name),
        );
    }
    if name.len() > MAX_NAME_LENGTH {
        findings.push(
            ValidationError::warning(
                "name",
                format!("middleware name exceeds {MAX_NAME_LENGTH} characters"),
                "NAME_TOO_LONG",
            )
            .with_value(name),
        );
    }
    if existing_names.contains(name) {
        findings.push(
            ValidationError::error("name", "middleware name is already registered", "DUPLICATE_NAME")
                .with_value(name),
        );
    }

    findings
}

/// Validates one registration against metadata and dependency rules.
#[must_use]
pub fn validate_single(
    registration: &MiddlewareRegistration,
    registry: &BTreeMap<String, MiddlewareRegistration>,
) -> Vec<ValidationError> {
    let mut findings = Vec::new();
    let name = &registration.name;

    if !is_valid_name(name) {
        findings.push(
            ValidationError::error(
                "name",
                "middleware names may only contain [a-zA-Z0-9_-]",
                "INVALID_NAME_FORMAT",
            )
            .with_value(name.clone()),
        );
    }
    if registration.version.is_empty() {
        findings.push(ValidationError::error(
            format!("{name}.version"),
            "version is required",
            "MISSING_VERSION",
        ));
    }
    if registration.description.is_empty() {
        findings.push(ValidationError::warning(
            format!("{name}.description"),
            "a description is recommended",
            "NO_DESCRIPTION",
        ));
    }
    if registration.author.is_empty() {
        findings.push(ValidationError::warning(
            format!("{name}.author"),
            "an author is recommended",
            "NO_AUTHOR",
        ));
    }
    if registration.contexts.is_empty() {
        findings.push(ValidationError::error(
            format!("{name}.contexts"),
            "at least one application context is required",
            "NO_CONTEXTS",
        ));
    }
    if registration.config.priority > MAX_PRIORITY {
        findings.push(
            ValidationError::error(
                format!("{name}.priority"),
                format!("priority must be within 0..={MAX_PRIORITY}"),
                "PRIORITY_OUT_OF_RANGE",
            )
            .with_value(registration.config.priority.to_string()),
        );
    }
    if registration.config.name != registration.name {
        findings.push(
            ValidationError::error(
                format!("{name}.config.name"),
                "config name must match the registration name",
                "CONFIG_NAME_MISMATCH",
            )
            .with_value(registration.config.name.clone()),
        );
    }
    for dependency in &registration.dependencies {
        if !registry.contains_key(dependency) {
            findings.push(
                ValidationError::error(
                    format!("{name}.dependencies"),
                    format!("dependency '{dependency}' is not registered"),
                    "UNRESOLVED_DEPENDENCY",
                )
                .with_value(dependency.clone()),
            );
        }
    }

    findings
}

/// Audits whether a registration can be removed safely.
///
/// Removal is blocked by *direct* dependents only; the DFS additionally
/// surfaces the transitive dependents chain so operators see the blast
/// radius of forcing a removal.
#[must_use]
pub fn can_remove(
    name: &str,
    registry: &BTreeMap<String, MiddlewareRegistration>,
) -> RemovalCheck {
    let mut warnings = Vec::new();
    if !registry.contains_key(name) {
        warnings.push(format!("'{name}' is not registered"));
        return RemovalCheck {
            can_remove: true,
            direct_dependents: Vec::new(),
            transitive_dependents: Vec::new(),
            warnings,
        };
    }

    let direct: Vec<String> = registry
        .values()
        .filter(|reg| reg.name != name && reg.dependencies.iter().any(|d| d == name))
        .map(|reg| reg.name.clone())
        .collect();

    // DFS over the dependents graph, past the direct layer.
    let mut transitive = Vec::new();
    let mut seen: BTreeSet<String> = direct.iter().cloned().collect();
    seen.insert(name.to_string());
    let mut stack: Vec<String> = direct.clone();
    while let Some(current) = stack.pop() {
        for reg in registry.values() {
            if reg.dependencies.iter().any(|d| d == &current) && seen.insert(reg.name.clone()) {
                transitive.push(reg.name.clone());
                stack.push(reg.name.clone());
            }
        }
    }
    transitive.sort();

    for dependent in &direct {
        warnings.push(format!("'{dependent}' directly depends on '{name}'"));
    }
    if !transitive.is_empty() {
        warnings.push(format!(
            "removing '{name}' would also strand {} transitive dependent(s): {}",
            transitive.len(),
            transitive.join(", ")
        ));
    }

    RemovalCheck {
        can_remove: direct.is_empty(),
        direct_dependents: direct,
        transitive_dependents: transitive,
        warnings,
    }
}

/// Runs the full-registry audit.
#[must_use]
pub fn validate(registry: &BTreeMap<String, MiddlewareRegistration>) -> ValidationReport {
    let mut errors = Vec::new();
    for registration in registry.values() {
        errors.extend(validate_single(registration, registry));
    }

    let cycles = detect_cycles(registry);
    let conflicts = detect_priority_conflicts(registry);
    let statistics = compute_statistics(registry);
    let recommendations = derive_recommendations(registry, &statistics);

    let valid = !errors.iter().any(ValidationError::is_error)
        && !cycles.iter().any(|c| c.severity == Severity::Error);

    ValidationReport {
        valid,
        errors,
        cycles,
        conflicts,
        statistics,
        recommendations,
    }
}

/// Detects dependency cycles with a DFS and explicit recursion stack.
///
/// Each loop is reported once: the discovered path is rotated so the
/// lexicographically smallest member leads, then deduplicated.
fn detect_cycles(registry: &BTreeMap<String, MiddlewareRegistration>) -> Vec<DependencyCycle> {
    fn dfs(
        node: &str,
        registry: &BTreeMap<String, MiddlewareRegistration>,
        visited: &mut BTreeSet<String>,
        stack: &mut Vec<String>,
        on_stack: &mut BTreeSet<String>,
        found: &mut Vec<Vec<String>>,
    ) {
        if on_stack.contains(node) {
            if let Some(pos) = stack.iter().position(|n| n == node) {
                found.push(stack[pos..].to_vec());
            }
            return;
        }
        if visited.contains(node) {
            return;
        }
        visited.insert(node.to_string());
        stack.push(node.to_string());
        on_stack.insert(node.to_string());

        if let Some(registration) = registry.get(node) {
            for dependency in &registration.dependencies {
                if registry.contains_key(dependency) {
                    dfs(dependency, registry, visited, stack, on_stack, found);
                }
            }
        }

        stack.pop();
        on_stack.remove(node);
    }

    let mut visited = BTreeSet::new();
    let mut found = Vec::new();
    for name in registry.keys() {
        let mut stack = Vec::new();
        let mut on_stack = BTreeSet::new();
        dfs(name, registry, &mut visited, &mut stack, &mut on_stack, &mut found);
    }

    let mut seen = BTreeSet::new();
    let mut cycles = Vec::new();
    for mut path in found {
        // Canonical rotation: smallest member first.
        if let Some(min_pos) = path
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.cmp(b))
            .map(|(i, _)| i)
        {
            path.rotate_left(min_pos);
        }
        if seen.insert(path.clone()) {
            cycles.push(DependencyCycle {
                cycle_length: path.len(),
                middleware_names: path,
                severity: Severity::Error,
            });
        }
    }
    cycles
}

/// Finds pairs sharing both a priority value and an application context.
fn detect_priority_conflicts(
    registry: &BTreeMap<String, MiddlewareRegistration>,
) -> Vec<PriorityConflict> {
    let mut by_priority: BTreeMap<u8, Vec<&MiddlewareRegistration>> = BTreeMap::new();
    for registration in registry.values() {
        by_priority
            .entry(registration.config.priority)
            .or_default()
            .push(registration);
    }

    let mut conflicts = Vec::new();
    for (priority, group) in by_priority {
        for (i, a) in group.iter().enumerate() {
            for b in &group[i + 1..] {
                for context in a.contexts.intersection(&b.contexts) {
                    conflicts.push(PriorityConflict {
                        middleware_a: a.name.clone(),
                        middleware_b: b.name.clone(),
                        priority,
                        context: *context,
                        severity: Severity::Warning,
                    });
                }
            }
        }
    }
    conflicts
}

fn compute_statistics(
    registry: &BTreeMap<String, MiddlewareRegistration>,
) -> ValidationStatistics {
    let total = registry.len();
    let enabled_count = registry.values().filter(|r| r.config.enabled).count();
    let total_dependencies: usize = registry.values().map(|r| r.dependencies.len()).sum();
    let unresolved_dependencies = registry
        .values()
        .flat_map(|r| r.dependencies.iter())
        .filter(|dep| !registry.contains_key(*dep))
        .count();
    let average_priority = if total == 0 {
        0.0
    } else {
        registry
            .values()
            .map(|r| f64::from(r.config.priority))
            .sum::<f64>()
            / total as f64
    };
    let contexts_used = registry
        .values()
        .flat_map(|r| r.contexts.iter().copied())
        .collect::<BTreeSet<ApplicationContext>>()
        .len();
    let security_middleware_count = registry
        .values()
        .filter(|r| r.category.is_security_related())
        .count();

    let score = 2 * total as u32
        + 5 * unresolved_dependencies as u32
        + 3 * security_middleware_count as u32;

    ValidationStatistics {
        total_middleware: total,
        enabled_count,
        disabled_count: total - enabled_count,
        total_dependencies,
        unresolved_dependencies,
        average_priority,
        contexts_used,
        security_middleware_count,
        performance_impact_score: score.min(100),
    }
}

fn derive_recommendations(
    registry: &BTreeMap<String, MiddlewareRegistration>,
    statistics: &ValidationStatistics,
) -> Vec<String> {
    let mut recommendations = Vec::new();

    let high_priority = registry
        .values()
        .filter(|r| r.config.priority >= HIGH_PRIORITY_THRESHOLD)
        .count();
    if high_priority > HIGH_PRIORITY_LIMIT {
        recommendations.push(format!(
            "{high_priority} middleware have priority >= {HIGH_PRIORITY_THRESHOLD}; \
             spread priorities to keep ordering meaningful"
        ));
    }
    if statistics.total_middleware > 0 && statistics.security_middleware_count == 0 {
        recommendations.push(
            "no security, authentication or authorization middleware is registered".to_string(),
        );
    }
    if statistics.unresolved_dependencies > 0 {
        recommendations.push(format!(
            "{} dependency reference(s) are unresolved; register the missing middleware \
             or drop the references",
            statistics.unresolved_dependencies
        ));
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use daedalus_core::context::ExecutionContext;
    use daedalus_core::error::MiddlewareError;
    use daedalus_core::middleware::{BoxFuture, Middleware};
    use daedalus_core::types::MiddlewareCategory;
    use std::sync::Arc;

    struct Noop;

    impl Middleware for Noop {
        fn execute<'a>(
            &'a self,
            _ctx: &'a mut ExecutionContext,
        ) -> BoxFuture<'a, Result<(), MiddlewareError>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn registration(name: &str) -> MiddlewareRegistration {
        MiddlewareRegistration::new(name, MiddlewareCategory::Custom, Arc::new(Noop))
            .with_version("1.0.0")
            .with_description("test middleware")
            .with_author("tests")
            .with_context(ApplicationContext::User)
    }

    /// Builds a registration map directly, bypassing the store's strict
    /// gate, so audits can exercise states that arrive through unusual
    /// mutation paths.
    fn map_of(regs: Vec<MiddlewareRegistration>) -> BTreeMap<String, MiddlewareRegistration> {
        regs.into_iter().map(|r| (r.name.clone(), r)).collect()
    }

    #[test]
    fn test_validate_name_rules() {
        let existing: BTreeSet<String> = ["auth".to_string()].into_iter().collect();

        assert!(validate_name("logging", &existing).is_empty());

        let findings = validate_name("", &existing);
        assert_eq!(findings[0].code, "EMPTY_NAME");

        let findings = validate_name("has space", &existing);
        assert_eq!(findings[0].code, "INVALID_NAME_FORMAT");

        let long = "x".repeat(60);
        let findings = validate_name(&long, &existing);
        assert_eq!(findings[0].code, "NAME_TOO_LONG");
        assert_eq!(findings[0].severity, Severity::Warning);

        let findings = validate_name("auth", &existing);
        assert_eq!(findings[0].code, "DUPLICATE_NAME");
    }

    #[test]
    fn test_validate_single_metadata_rules() {
        let registry = map_of(vec![registration("auth")]);

        let mut bare =
            MiddlewareRegistration::new("bare", MiddlewareCategory::Custom, Arc::new(Noop));
        bare.config.name = "mismatch".to_string();
        bare.config.priority = 150;
        bare.dependencies.push("ghost".to_string());

        let findings = validate_single(&bare, &registry);
        let codes: BTreeSet<&str> = findings.iter().map(|f| f.code.as_str()).collect();
        assert!(codes.contains("MISSING_VERSION"));
        assert!(codes.contains("NO_DESCRIPTION"));
        assert!(codes.contains("NO_AUTHOR"));
        assert!(codes.contains("NO_CONTEXTS"));
        assert!(codes.contains("PRIORITY_OUT_OF_RANGE"));
        assert!(codes.contains("CONFIG_NAME_MISMATCH"));
        assert!(codes.contains("UNRESOLVED_DEPENDENCY"));

        let findings = validate_single(&registration("auth"), &registry);
        assert!(findings.iter().all(|f| !f.is_error()));
    }

    #[test]
    fn test_two_node_cycle_reported_once() {
        let registry = map_of(vec![
            registration("a").with_dependency("b"),
            registration("b").with_dependency("a"),
        ]);

        let report = validate(&registry);
        assert_eq!(report.cycles.len(), 1);
        assert_eq!(report.cycles[0].cycle_length, 2);
        assert_eq!(report.cycles[0].severity, Severity::Error);
        assert!(!report.valid);
    }

    #[test]
    fn test_longer_cycle_and_acyclic_graph() {
        let registry = map_of(vec![
            registration("a").with_dependency("b"),
            registration("b").with_dependency("c"),
            registration("c").with_dependency("a"),
        ]);
        let report = validate(&registry);
        assert_eq!(report.cycles.len(), 1);
        assert_eq!(report.cycles[0].cycle_length, 3);
        assert_eq!(report.cycles[0].middleware_names[0], "a");

        let registry = map_of(vec![
            registration("a").with_dependency("b"),
            registration("b"),
        ]);
        let report = validate(&registry);
        assert!(report.cycles.is_empty());
        assert!(report.valid);
    }

    #[test]
    fn test_priority_conflict_per_shared_context() {
        let registry = map_of(vec![
            registration("a").with_priority(50),
            registration("b").with_priority(50),
            registration("c").with_priority(60),
        ]);

        let report = validate(&registry);
        assert_eq!(report.conflicts.len(), 1);
        let conflict = &report.conflicts[0];
        assert_eq!(conflict.priority, 50);
        assert_eq!(conflict.context, ApplicationContext::User);
        assert_eq!(conflict.severity, Severity::Warning);
        // Conflicts alone never invalidate the registry.
        assert!(report.valid);
    }

    #[test]
    fn test_can_remove_direct_and_transitive() {
        let registry = map_of(vec![
            registration("base"),
            registration("mid").with_dependency("base"),
            registration("top").with_dependency("mid"),
        ]);

        let check = can_remove("base", &registry);
        assert!(!check.can_remove);
        assert_eq!(check.direct_dependents, vec!["mid"]);
        assert_eq!(check.transitive_dependents, vec!["top"]);
        assert!(check.warnings.iter().any(|w| w.contains("mid")));

        let check = can_remove("top", &registry);
        assert!(check.can_remove);
        assert!(check.direct_dependents.is_empty());
    }

    #[test]
    fn test_statistics_and_score() {
        let registry = map_of(vec![
            MiddlewareRegistration::new("auth", MiddlewareCategory::Authentication, Arc::new(Noop))
                .with_version("1.0.0")
                .with_description("d")
                .with_author("a")
                .with_context(ApplicationContext::User)
                .with_priority(90),
            registration("audit").with_priority(10).with_enabled(false),
            registration("broken").with_dependency("ghost"),
        ]);

        let report = validate(&registry);
        let stats = &report.statistics;
        assert_eq!(stats.total_middleware, 3);
        assert_eq!(stats.enabled_count, 2);
        assert_eq!(stats.disabled_count, 1);
        assert_eq!(stats.unresolved_dependencies, 1);
        assert_eq!(stats.security_middleware_count, 1);
        // 2*3 + 5*1 + 3*1 = 14
        assert_eq!(stats.performance_impact_score, 14);
        assert!((stats.average_priority - 50.0).abs() < f64::EPSILON);

        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("unresolved")));
        // The unresolved dependency is error severity, so the audit fails.
        assert!(!report.valid);
    }

    #[test]
    fn test_score_is_bounded() {
        let mut regs = Vec::new();
        for i in 0..80 {
            regs.push(registration(&format!("mw-{i}")));
        }
        let report = validate(&map_of(regs));
        assert_eq!(report.statistics.performance_impact_score, 100);
    }

    #[test]
    fn test_missing_security_recommendation() {
        let report = validate(&map_of(vec![registration("audit")]));
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("security")));
    }
}

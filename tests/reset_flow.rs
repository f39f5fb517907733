//! Integration tests for `override reset`: rebuilding the rewired state from
//! the overrides on disk.

use forkwire::core::{
    override_engine::{override_function, reset_rewired},
    project::ProjectState,
    prompt::ScriptedPrompter,
    source_index::FunctionPath,
};

mod util;
use util::Project;

fn fp(s: &str) -> FunctionPath
{
    FunctionPath::parse(s).unwrap()
}

#[test]
fn reset_repairs_drifted_rewired_state()
{
    let project = Project::new();
    override_function(&mut project.session(ScriptedPrompter::detached()), "array/sum", true).unwrap();

    // Hand-made drift: a missing shim, a stray shim, and `avg` overridden
    // without going through `fw override`
    std::fs::remove_file(project.root().join("overrides/rewired/array/stats.ts")).unwrap();
    project.write("overrides/rewired/async/retry.ts", "export function retry() {}\n");
    project.write("overrides/src/array/avg.ts", "export function avg() { return 0 }\n");
    project.commit_all();

    let drift = ProjectState::scan(&project.env()).unwrap().drift();
    assert_eq!(drift.missing_shims, vec![fp("array/stats")]);
    assert_eq!(drift.unlisted_shims, vec![fp("async/retry")]);
    assert_eq!(drift.conflicts, vec![fp("array/avg")]);

    let report = reset_rewired(&mut project.session(ScriptedPrompter::detached())).unwrap();

    assert_eq!(report.before, vec![fp("array/avg"), fp("array/stats")]);
    assert_eq!(report.after, vec![fp("array/stats")]);
    assert!(report.changed());
    assert!(report.committed);

    assert!(ProjectState::scan(&project.env()).unwrap().drift().is_empty());
    assert!(project.exists("overrides/rewired/array/stats.ts"));
    assert!(!project.exists("overrides/rewired/async/retry.ts"));
    assert!(!project.exists("overrides/rewired/array/avg.ts"));
    assert_eq!(
        project.vcs.commits().last().map(String::as_str),
        Some("commit chore: update overrides/rewired.json [overrides mod.ts] by Radashi Bot")
    );
}

#[test]
fn reset_without_changes_does_not_commit()
{
    let project = Project::new();
    override_function(&mut project.session(ScriptedPrompter::detached()), "async/sleep", true).unwrap();
    let tree = project.tree();

    let report = reset_rewired(&mut project.session(ScriptedPrompter::detached())).unwrap();

    assert_eq!(report.before, vec![fp("async/retry")]);
    assert!(!report.changed());
    assert!(!report.committed);
    assert_eq!(project.tree(), tree);
    assert_eq!(project.vcs.commits().len(), 1);
}

#[test]
fn reset_keeps_the_manifest_order_of_earlier_overrides()
{
    let project = Project::new();
    override_function(&mut project.session(ScriptedPrompter::detached()), "async/sleep", true).unwrap();
    override_function(&mut project.session(ScriptedPrompter::detached()), "array/sum", true).unwrap();
    let tree = project.tree();

    let report = reset_rewired(&mut project.session(ScriptedPrompter::detached())).unwrap();

    let expected = vec![fp("async/retry"), fp("array/avg"), fp("array/stats")];
    assert_eq!(report.before, expected);
    assert_eq!(report.after, expected);
    assert!(!report.changed());
    assert!(!report.committed);
    assert_eq!(project.tree(), tree);
    assert_eq!(project.vcs.commits().len(), 2);
}

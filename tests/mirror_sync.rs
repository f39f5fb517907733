//! Integration tests for upstream mirror synchronization.

use forkwire::core::prompt::ScriptedPrompter;
use forkwire::infra::config::Config;

mod util;
use util::Project;

fn without_mirror() -> Project
{
    let project = Project::new();
    std::fs::remove_dir_all(project.root().join(".forkwire")).unwrap();
    project
}

#[test]
fn mirror_syncs_once_per_session()
{
    let project = Project::new();
    let mut session = project.session(ScriptedPrompter::detached());

    assert!(!session.mirror.is_synced());
    session.ensure_mirror().unwrap();
    session.ensure_mirror().unwrap();

    assert!(session.mirror.is_synced());
    assert_eq!(project.vcs.log(), vec!["checkout main", "pull main"]);
}

#[test]
fn missing_mirror_is_cloned_shallow_for_a_branch()
{
    let project = without_mirror();
    let mut session = project.session(ScriptedPrompter::detached());

    session.ensure_mirror().unwrap();

    assert_eq!(
        project.vcs.log(),
        vec!["clone https://github.com/radashi-org/radashi.git main shallow=true"]
    );
    assert!(project.exists(".forkwire/upstream/src/array/sum.ts"));
}

#[test]
fn commit_refs_are_cloned_in_full_then_checked_out()
{
    let project = without_mirror();
    let config = Config { upstream_ref: "4f2c9e1".into(), ..Config::default() };
    let mut session = project.session_with(config, ScriptedPrompter::detached());

    session.ensure_mirror().unwrap();

    assert_eq!(
        project.vcs.log(),
        vec![
            "clone https://github.com/radashi-org/radashi.git 4f2c9e1 shallow=false",
            "checkout 4f2c9e1",
        ]
    );
}

#[test]
fn existing_mirror_on_a_tag_fetches_then_checks_out()
{
    let project = Project::new();
    let config = Config { upstream_ref: "v12.2.0".into(), ..Config::default() };
    let mut session = project.session_with(config, ScriptedPrompter::detached());

    session.ensure_mirror().unwrap();

    assert_eq!(project.vcs.log(), vec!["fetch", "checkout v12.2.0"]);
}

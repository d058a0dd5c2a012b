use std::{cell::RefCell, rc::Rc};

use futures::executor::block_on;
use portal_core::{
    containers::ContextType, Context, CoreConfig, DistributedState, EventHub, Portal,
};
use portal_host::{HttpResponse as RawResponse, MemoryHost};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn shell_portal(host: &MemoryHost) -> Portal {
    let mut config = CoreConfig::default();
    config.auth.client_id = "portal-client".to_string();
    Portal::init(host.services(), config).expect("init portal")
}

#[test]
fn every_instance_converges_after_any_write() {
    let hub = EventHub::new();
    let realms: Vec<DistributedState<Vec<String>>> = (0..4)
        .map(|_| DistributedState::new("Realms.selection", Vec::new(), &hub))
        .collect();

    realms[2].set_state(vec!["a".to_string()]);
    realms[0].update(|selection| selection.push("b".to_string()));

    for realm in &realms {
        assert_eq!(realm.state(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(realm.version(), realms[0].version());
    }
}

#[test]
fn late_joining_realm_sees_current_value_without_a_write() {
    let hub = EventHub::new();
    let shell = DistributedState::new("Realms.theme", "light".to_string(), &hub);
    shell.set_state("dark".to_string());

    let app = DistributedState::new("Realms.theme", "light".to_string(), &hub);
    assert_eq!(app.state(), "dark");
}

#[test]
fn joined_portal_shares_settings_apps_and_context() {
    let host = MemoryHost::default();
    let shell = shell_portal(&host);
    let app = shell.join(host.services());

    block_on(shell.settings().set_async("theme", "dark")).expect("set setting");
    assert_eq!(
        block_on(app.settings().get_async::<String>("theme")).expect("get setting"),
        Some("dark".to_string())
    );

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let _sub = shell
        .context()
        .on_current_context_changed(move |current| sink.borrow_mut().push(current.map(|c| c.id.clone())));

    let project = Context {
        id: "p1".to_string(),
        external_id: None,
        context_type: ContextType {
            id: "ProjectMaster".to_string(),
        },
        title: "Project 1".to_string(),
        value: Value::Null,
    };
    block_on(app.context().set_current_context_async(Some(&project))).expect("set context");
    assert_eq!(
        block_on(shell.context().get_current_context_async()).expect("current"),
        Some(project)
    );
    assert!(seen.borrow().contains(&Some("p1".to_string())));

    host.transport.enqueue(
        "https://pro-s-portal-ci.azurewebsites.net/api/apps",
        RawResponse::json(&json!([{"key": "meetings", "name": "Meetings"}])),
    );
    block_on(shell.apps().fetch_apps_async()).expect("fetch apps");
    assert_eq!(
        app.apps().get("meetings").map(|manifest| manifest.name),
        Some("Meetings".to_string())
    );
}

#[test]
fn fresh_portal_rehydrates_persisted_settings() {
    let host = MemoryHost::default();
    let first = shell_portal(&host);
    block_on(first.settings().set_async("pinned", &["meetings", "tasks"])).expect("set");
    drop(first);

    let reloaded = shell_portal(&host);
    assert_eq!(
        block_on(reloaded.settings().get_async::<Vec<String>>("pinned")).expect("get"),
        Some(vec!["meetings".to_string(), "tasks".to_string()])
    );
}

mod common;

use common::FakeFirewall;
use smdr_core::error::ErrorKind;
use smdr_core::firewall::{inbound_rule_name, FirewallSynchronizer};

const PRODUCT: &str = "SMDR Receiver";

#[test]
fn rule_name_embeds_product_direction_protocol_and_port() {
    assert_eq!(inbound_rule_name(PRODUCT, 7004), "SMDRReceiver-In-TCP-7004");
    assert_ne!(inbound_rule_name(PRODUCT, 7004), inbound_rule_name(PRODUCT, 7005));
}

#[test]
fn ensure_twice_leaves_exactly_one_rule() {
    let fake = FakeFirewall::new();
    let mut sync = FirewallSynchronizer::new(fake.boxed(), PRODUCT);
    let name = inbound_rule_name(PRODUCT, 7004);

    sync.ensure_inbound_rule(&name, 7004).expect("first ensure");
    sync.ensure_inbound_rule(&name, 7004).expect("second ensure");

    assert_eq!(fake.count(&name), 1);
}

#[test]
fn remove_tolerates_absent_rule() {
    let fake = FakeFirewall::new();
    fake.0.borrow_mut().fail_delete = true;
    let mut sync = FirewallSynchronizer::new(fake.boxed(), PRODUCT);

    sync.remove_inbound_rule("SMDRReceiver-In-TCP-9999")
        .expect("absent rule removal is a no-op");
}

#[test]
fn reconfiguring_port_replaces_the_stale_rule() {
    let fake = FakeFirewall::new();
    let mut sync = FirewallSynchronizer::new(fake.boxed(), PRODUCT);
    let mut tracked = Vec::new();

    sync.sync_port(&mut tracked, 7004).expect("install on 7004");
    assert_eq!(fake.rule_names(), vec!["SMDRReceiver-In-TCP-7004".to_string()]);

    sync.sync_port(&mut tracked, 7005).expect("reconfigure to 7005");

    assert_eq!(fake.count("SMDRReceiver-In-TCP-7004"), 0);
    assert_eq!(fake.count("SMDRReceiver-In-TCP-7005"), 1);
    assert_eq!(fake.rule_names().len(), 1);
    assert_eq!(tracked, vec!["SMDRReceiver-In-TCP-7005".to_string()]);
}

#[test]
fn resync_on_same_port_is_a_noop() {
    let fake = FakeFirewall::new();
    let mut sync = FirewallSynchronizer::new(fake.boxed(), PRODUCT);
    let mut tracked = Vec::new();

    sync.sync_port(&mut tracked, 7004).expect("first");
    sync.sync_port(&mut tracked, 7004).expect("second");

    assert_eq!(fake.rule_names().len(), 1);
    assert_eq!(tracked.len(), 1);
}

#[test]
fn failed_stale_removal_is_kept_tracked_and_new_rule_still_added() {
    let fake = FakeFirewall::new();
    let mut sync = FirewallSynchronizer::new(fake.boxed(), PRODUCT);
    let mut tracked = Vec::new();
    sync.sync_port(&mut tracked, 7004).expect("install on 7004");

    fake.0.borrow_mut().fail_delete = true;
    let err = sync.sync_port(&mut tracked, 7005).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Firewall);
    assert!(!err.is_fatal());
    assert_eq!(fake.count("SMDRReceiver-In-TCP-7005"), 1);
    assert!(tracked.contains(&"SMDRReceiver-In-TCP-7004".to_string()));
    assert!(tracked.contains(&"SMDRReceiver-In-TCP-7005".to_string()));

    fake.0.borrow_mut().fail_delete = false;
    sync.sync_port(&mut tracked, 7005).expect("retry converges");
    assert_eq!(fake.rule_names(), vec!["SMDRReceiver-In-TCP-7005".to_string()]);
    assert_eq!(tracked, vec!["SMDRReceiver-In-TCP-7005".to_string()]);
}

#[test]
fn remove_tracked_clears_every_rule() {
    let fake = FakeFirewall::new();
    let mut sync = FirewallSynchronizer::new(fake.boxed(), PRODUCT);
    let mut tracked = Vec::new();
    sync.sync_port(&mut tracked, 7004).expect("sync");

    sync.remove_tracked(&mut tracked).expect("remove tracked");

    assert!(tracked.is_empty());
    assert!(fake.rule_names().is_empty());
}

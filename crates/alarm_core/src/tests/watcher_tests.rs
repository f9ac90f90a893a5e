use super::*;

use chrono::NaiveDateTime;

use crate::{
    alarm::AlarmState,
    clock::FixedClock,
    test_support::{at, order, store_hours, FakeHardware, ScriptedMail, StaticConfig},
};

async fn tick(watcher: &mut OrderWatcher, alarm: &mut AlarmController) -> TickOutcome {
    let fetched = watcher.fetch().await;
    watcher.handle(fetched, alarm)
}

fn alarm_at(now: NaiveDateTime) -> (AlarmController, Arc<FakeHardware>) {
    let hardware = FakeHardware::new();
    let (alarm, _presses) = AlarmController::new(
        hardware.clone(),
        StaticConfig::new(store_hours()),
        Arc::new(FixedClock(now)),
        &store_hours(),
    );
    (alarm, hardware)
}

#[tokio::test]
async fn same_message_twice_triggers_once() {
    let mail = ScriptedMail::new([order("18c1"), order("18c1")]);
    let mut watcher = OrderWatcher::new(mail.clone());
    let (mut alarm, hardware) = alarm_at(at(2024, 1, 1, 10, 0));

    let first = tick(&mut watcher, &mut alarm).await;
    let second = tick(&mut watcher, &mut alarm).await;

    assert!(matches!(
        first,
        TickOutcome::NewOrder { trigger: Ok(TriggerOutcome::Started), .. }
    ));
    assert!(matches!(second, TickOutcome::AlreadySeen));
    assert_eq!(watcher.last_seen(), Some(&OrderMessageId("18c1".into())));
    assert_eq!(hardware.armed_listeners(), 1);
    assert_eq!(mail.fetches(), 2);
}

#[tokio::test]
async fn non_order_messages_are_ignored() {
    let mail = ScriptedMail::new([Ok(Some(MailMessage::new("18c2", "Your weekly digest")))]);
    let mut watcher = OrderWatcher::new(mail);
    let (mut alarm, _hardware) = alarm_at(at(2024, 1, 1, 10, 0));

    let outcome = tick(&mut watcher, &mut alarm).await;

    assert!(matches!(outcome, TickOutcome::NotAnOrder));
    assert!(watcher.last_seen().is_none());
    assert_eq!(alarm.state(), AlarmState::Idle);
}

#[tokio::test]
async fn order_without_id_is_ignored() {
    let mail = ScriptedMail::new([
        Ok(Some(MailMessage {
            id: None,
            snippet: Some("Order Assigned: #1".into()),
        })),
        Ok(Some(MailMessage::new("", "Order Assigned: #2"))),
    ]);
    let mut watcher = OrderWatcher::new(mail);
    let (mut alarm, _hardware) = alarm_at(at(2024, 1, 1, 10, 0));

    assert!(matches!(tick(&mut watcher, &mut alarm).await, TickOutcome::NotAnOrder));
    assert!(matches!(tick(&mut watcher, &mut alarm).await, TickOutcome::NotAnOrder));
    assert!(watcher.last_seen().is_none());
}

#[tokio::test]
async fn empty_inbox_is_not_an_event() {
    let mail = ScriptedMail::new([Ok(None)]);
    let mut watcher = OrderWatcher::new(mail);
    let (mut alarm, _hardware) = alarm_at(at(2024, 1, 1, 10, 0));

    assert!(matches!(tick(&mut watcher, &mut alarm).await, TickOutcome::NoMessage));
}

#[tokio::test]
async fn fetch_failure_skips_the_tick() {
    let mail = ScriptedMail::new([Err("invalid_grant".to_string()), order("18c3")]);
    let mut watcher = OrderWatcher::new(mail);
    let (mut alarm, _hardware) = alarm_at(at(2024, 1, 1, 10, 0));

    assert!(matches!(tick(&mut watcher, &mut alarm).await, TickOutcome::FetchFailed));
    assert!(watcher.last_seen().is_none());
    assert_eq!(alarm.state(), AlarmState::Idle);

    assert!(matches!(
        tick(&mut watcher, &mut alarm).await,
        TickOutcome::NewOrder { .. }
    ));
    assert!(alarm.is_sounding());
}

#[tokio::test]
async fn newer_order_while_sounding_is_recorded_as_duplicate_trigger() {
    let mail = ScriptedMail::new([order("18c4"), order("18c5")]);
    let mut watcher = OrderWatcher::new(mail);
    let (mut alarm, hardware) = alarm_at(at(2024, 1, 1, 10, 0));

    tick(&mut watcher, &mut alarm).await;
    let outcome = tick(&mut watcher, &mut alarm).await;

    assert!(matches!(
        outcome,
        TickOutcome::NewOrder { trigger: Ok(TriggerOutcome::Duplicate), .. }
    ));
    assert_eq!(watcher.last_seen(), Some(&OrderMessageId("18c5".into())));
    assert_eq!(hardware.armed_listeners(), 1);
}

#[tokio::test]
async fn order_outside_hours_is_acknowledged_without_alarm() {
    let mail = ScriptedMail::new([order("18c6"), order("18c6")]);
    let mut watcher = OrderWatcher::new(mail);
    let (mut alarm, hardware) = alarm_at(at(2024, 1, 1, 20, 0));

    let first = tick(&mut watcher, &mut alarm).await;
    let second = tick(&mut watcher, &mut alarm).await;

    assert!(matches!(
        first,
        TickOutcome::NewOrder { trigger: Ok(TriggerOutcome::Suppressed), .. }
    ));
    assert!(matches!(second, TickOutcome::AlreadySeen));
    assert_eq!(hardware.assertions(), 0);
}

#[tokio::test]
async fn fetch_runs_detached_from_the_watcher() {
    let mail = ScriptedMail::new([order("18c7")]);
    let mut watcher = OrderWatcher::new(mail.clone());
    let (mut alarm, _hardware) = alarm_at(at(2024, 1, 1, 10, 0));

    let pending = watcher.fetch();
    assert!(watcher.last_seen().is_none());
    let fetched = tokio::spawn(pending).await.expect("fetch task");

    assert!(matches!(
        watcher.handle(fetched, &mut alarm),
        TickOutcome::NewOrder { trigger: Ok(TriggerOutcome::Started), .. }
    ));
    assert_eq!(mail.fetches(), 1);
}

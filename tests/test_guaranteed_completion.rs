//! A run with no live events always completes on simulation alone.

mod common;

use std::time::Duration;

use livecoord::engine::{Origin, Phase, VirtualClock, drive};
use livecoord::transport::LiveEvent;

const TICK: Duration = Duration::from_millis(250);

#[test]
fn full_activation_completes_within_target_plus_one_poll() {
    for seed in [1, 7, 2024, 31_337, u64::MAX] {
        let mut coordinator = common::coordinator("live-activation", seed);
        let poll = coordinator.scenario().simulator.poll_interval;
        let target = coordinator.scenario().scenario.target_completion;
        assert_eq!(target, Duration::from_secs(720));
        assert_eq!(coordinator.scenario().total_members(), 30);

        coordinator.start(common::activation("full"));
        let run = drive(&mut coordinator, VirtualClock::new(TICK), target * 2, |_, _| {});

        let completed_at = run
            .completed_at
            .unwrap_or_else(|| panic!("seed {seed} never completed"));
        assert!(
            completed_at <= target + poll,
            "seed {seed} completed at {completed_at:?}"
        );

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.phase, Some(Phase::Complete));
        assert_eq!(snapshot.pending_simulated, 0);
        assert!(
            snapshot
                .ledger_snapshot
                .iter()
                .all(|e| e.origin == Origin::Simulated)
        );
    }
}

#[test]
fn live_channel_going_quiet_is_carried_by_stall_correction() {
    for seed in [1, 2, 3] {
        let mut coordinator = common::coordinator("live-activation", seed);
        let poll = coordinator.scenario().simulator.poll_interval;
        let target = coordinator.scenario().scenario.target_completion;
        let run = coordinator.start(common::activation("flaky")).run_id.clone();

        // Two stakeholders answer live, then the channel goes quiet.
        for id in ["ic", "ciso"] {
            let event = LiveEvent::MemberAcknowledged {
                member_id: Some(id.to_string()),
                member_name: None,
                member_role: None,
                acknowledged_at: None,
                total_stakeholders: None,
            };
            coordinator.apply_live(&run, &event).unwrap();
        }

        let outcome = drive(&mut coordinator, VirtualClock::new(TICK), target * 2, |_, _| {});
        let completed_at = outcome
            .completed_at
            .unwrap_or_else(|| panic!("seed {seed} never completed"));
        assert!(completed_at <= target + poll, "seed {seed} completed at {completed_at:?}");

        // Cold start never fired: every simulated record came from catch-up.
        assert!(
            outcome
                .reports
                .iter()
                .flat_map(|r| &r.scheduled)
                .all(|b| b.kind.as_str() == "catch_up"),
            "seed {seed}"
        );

        let snapshot = coordinator.snapshot();
        let (live, simulated) = snapshot.origin_counts();
        assert_eq!(snapshot.phase, Some(Phase::Complete));
        assert_eq!(live, 2, "seed {seed}");
        assert!(simulated > 0, "seed {seed}");
        assert!(snapshot.ratio >= 0.8, "seed {seed} ratio {}", snapshot.ratio);
    }
}

#[test]
fn phases_are_entered_in_order() {
    let mut coordinator = common::coordinator("live-activation", 3);
    coordinator.start(common::activation("ordered"));
    let run = drive(
        &mut coordinator,
        VirtualClock::new(TICK),
        Duration::from_secs(1440),
        |_, _| {},
    );

    let entered: Vec<Phase> = run
        .reports
        .iter()
        .flat_map(|r| r.transitions.iter().map(|t| t.to))
        .collect();
    assert_eq!(entered.last(), Some(&Phase::Complete));
    assert!(entered.windows(2).all(|w| w[0] < w[1]), "{entered:?}");
}

#[test]
fn one_click_has_full_ledger_by_second_fourteen() {
    for seed in 0..20 {
        let mut coordinator = common::coordinator("one-click", seed);
        coordinator.start(common::activation("click"));
        drive(
            &mut coordinator,
            VirtualClock::new(TICK),
            Duration::from_secs(14),
            |_, _| {},
        );

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.acknowledged, 8, "seed {seed}");
        assert_eq!(snapshot.phase, Some(Phase::Complete), "seed {seed}");
    }
}

#[test]
fn ledger_never_exceeds_roster() {
    let mut coordinator = common::coordinator("investor", 9);
    coordinator.start(common::activation("bounded"));
    let total = coordinator.scenario().total_members();
    drive(
        &mut coordinator,
        VirtualClock::new(TICK),
        Duration::from_secs(300),
        |c, _| {
            let snapshot = c.snapshot();
            assert!(snapshot.acknowledged <= total);
            assert!(snapshot.acknowledged + snapshot.pending_simulated <= total);
        },
    );
}

//! Property tests: random firing orders and data preserve the net's token
//! accounting and join semantics.

use std::collections::BTreeMap;

use proptest::{prelude::*, sample::Index};
use serde_json::{Value, json};

use crate::{
    common::Vars,
    runner::{CaseRunner, CaseStatus, EnableMode, FiringResult, Marking, WorkItemStatus, cancel, case::tests::spec, removable},
};

fn start(
    net: Value,
    data: Vars,
) -> CaseRunner {
    let mut runner = CaseRunner::new("case-p", spec(json!([net])), data);
    runner.start().unwrap();
    runner
}

/// OR split, OR join, a cancellation region and a loop back to the start.
fn looping_net() -> Value {
    json!({
        "id": "main", "input": "start", "output": "end",
        "conditions": [{ "id": "retry" }],
        "tasks": [
            { "id": "A", "split": "or" },
            { "id": "B" },
            { "id": "C", "cancels": ["A__B"] },
            { "id": "D", "join": "or", "split": "xor" }
        ],
        "flows": [
            { "source": "start", "target": "A" },
            { "source": "retry", "target": "A" },
            { "source": "A", "target": "B", "predicate": "b", "ordering": 1 },
            { "source": "A", "target": "C", "predicate": "c", "ordering": 2 },
            { "source": "A", "target": "D", "default": true },
            { "source": "B", "target": "D" },
            { "source": "C", "target": "D" },
            { "source": "D", "target": "retry", "predicate": "again" },
            { "source": "D", "target": "end", "default": true }
        ]
    })
}

fn count(
    places: &[String],
    place: &str,
) -> usize {
    places.iter().filter(|p| *p == place).count()
}

/// Every place ends with its old count, minus consumed tokens, zeroed if
/// cancelled, plus produced tokens.
fn check_firing(
    runner: &CaseRunner,
    before: &Marking,
    result: &FiringResult,
) -> Result<(), TestCaseError> {
    let after = runner.marking();
    prop_assert_eq!(after.total() + result.cancelled_tokens + result.consumed.len(), before.total() + result.produced.len());

    let cancellation = runner.net().task(&result.task).map(|t| t.cancellation_set.clone()).unwrap_or_default();
    let mut places: Vec<&str> = before.places().chain(after.places()).collect();
    places.sort();
    places.dedup();
    for place in places {
        let left = before.tokens(place) - count(&result.consumed, place);
        let kept = if cancellation.iter().any(|c| c == place) { 0 } else { left };
        prop_assert_eq!(after.tokens(place), kept + count(&result.produced, place), "place {}", place);
    }
    Ok(())
}

/// Three parallel branches meeting in an OR join; `A` cancels `cancels`.
fn region_net(cancels: &[&str]) -> Value {
    json!({
        "id": "main", "input": "start", "output": "end",
        "conditions": [{ "id": "cA" }, { "id": "cB" }, { "id": "cC" }],
        "tasks": [
            { "id": "S", "split": "and" },
            { "id": "A", "cancels": cancels },
            { "id": "B" },
            { "id": "C" },
            { "id": "J", "join": "or" }
        ],
        "flows": [
            { "source": "start", "target": "S" },
            { "source": "S", "target": "cA" },
            { "source": "S", "target": "cB" },
            { "source": "S", "target": "cC" },
            { "source": "cA", "target": "A" },
            { "source": "cB", "target": "B" },
            { "source": "cC", "target": "C" },
            { "source": "A", "target": "J" },
            { "source": "B", "target": "J" },
            { "source": "C", "target": "J" },
            { "source": "J", "target": "end" }
        ]
    })
}

fn live_item(
    runner: &CaseRunner,
    task: &str,
) -> String {
    runner.live_work_items().find(|w| w.task == task).map(|w| w.id.clone()).unwrap()
}

proptest! {
    #[test]
    fn cancel_clears_exactly_the_named_places(
        tokens in prop::collection::btree_map("[a-e]", 1usize..4, 0..5),
        set in prop::collection::vec("[a-g]", 0..6),
    ) {
        let before: Marking = tokens.clone().into_iter().collect();
        let mut after = before.clone();
        let (marked, removed) = removable(&set, &before);
        let cleared = cancel(&set, &mut after);

        prop_assert_eq!(&cleared, &marked);
        prop_assert_eq!(before.total() - after.total(), removed);
        for (place, count) in tokens.iter() {
            let expected = if set.contains(place) { 0 } else { *count };
            prop_assert_eq!(after.tokens(place), expected, "place {}", place);
        }
        for place in cleared.iter() {
            prop_assert!(set.contains(place) && before.is_marked(place));
        }
    }

    #[test]
    fn cancellation_reaches_only_its_region(
        set in prop::sample::subsequence(vec!["cB", "cC", "B", "C"], 0..=4),
        start_b in any::<bool>(),
        start_c in any::<bool>(),
    ) {
        let mut runner = start(region_net(&set), Vars::new());
        runner.fire("S").unwrap();
        let b = live_item(&runner, "B");
        let c = live_item(&runner, "C");
        if start_b {
            runner.start_work_item(&b).unwrap();
        }
        if start_c {
            runner.start_work_item(&c).unwrap();
        }

        let before = runner.marking().clone();
        let result = runner.fire("A").unwrap();
        check_firing(&runner, &before, &result)?;

        let expected: Vec<String> = set.iter().filter(|p| before.is_marked(p)).map(|p| p.to_string()).collect();
        prop_assert_eq!(&result.cancelled, &expected);

        for (task, condition, item, started) in [("B", "cB", &b, start_b), ("C", "cC", &c, start_c)] {
            // a started task holds its token at the task itself
            let held = if started { task } else { condition };
            let status = runner.work_item(item).unwrap().status;
            if set.contains(&held) {
                prop_assert_eq!(status, WorkItemStatus::Cancelled, "task {}", task);
                prop_assert!(result.cancelled_work_items.contains(item));
            } else {
                prop_assert_eq!(status, if started { WorkItemStatus::Started } else { WorkItemStatus::Enabled }, "task {}", task);
            }
        }
    }

    #[test]
    fn random_walks_conserve_tokens(
        b in any::<bool>(),
        c in any::<bool>(),
        again in any::<bool>(),
        choices in prop::collection::vec(any::<Index>(), 1..24),
    ) {
        let data = Vars::new().with("b", b).with("c", c).with("again", again);
        let mut runner = start(looping_net(), data);

        for choice in choices {
            if runner.status() != CaseStatus::Running {
                break;
            }
            let enabled = runner.enabled();
            prop_assert_eq!(&enabled, &runner.enabled());
            prop_assert!(!enabled.is_empty());

            let before = runner.marking().clone();
            let task = enabled[choice.index(enabled.len())].task.clone();
            let result = runner.fire(&task).unwrap();
            check_firing(&runner, &before, &result)?;
        }
        prop_assert_ne!(runner.status(), CaseStatus::Failed);
    }

    #[test]
    fn exclusive_choice_marks_one_branch(route_b in any::<bool>()) {
        let net = json!({
            "id": "main", "input": "start", "output": "end",
            "tasks": [{ "id": "A", "split": "xor" }, { "id": "B" }, { "id": "C" }, { "id": "D" }],
            "flows": [
                { "source": "start", "target": "A" },
                { "source": "A", "target": "B", "predicate": "route_b" },
                { "source": "A", "target": "C", "predicate": "true" },
                { "source": "B", "target": "D" },
                { "source": "C", "target": "D" },
                { "source": "D", "target": "end" }
            ]
        });
        let mut runner = start(net, Vars::new().with("route_b", route_b));
        let result = runner.fire("A").unwrap();
        prop_assert_eq!(result.produced.len(), 1);

        let fired: Vec<String> = runner.enabled().into_iter().map(|e| e.task).collect();
        prop_assert_eq!(fired, vec![if route_b { "B" } else { "C" }.to_string()]);
    }

    #[test]
    fn and_join_consumes_all_or_nothing(order in Just(vec!["B", "C", "E"]).prop_shuffle()) {
        let net = json!({
            "id": "main", "input": "start", "output": "end",
            "tasks": [{ "id": "A" }, { "id": "B" }, { "id": "C" }, { "id": "E" }, { "id": "D", "join": "and" }],
            "flows": [
                { "source": "start", "target": "A" },
                { "source": "A", "target": "B" },
                { "source": "A", "target": "C" },
                { "source": "A", "target": "E" },
                { "source": "B", "target": "D" },
                { "source": "C", "target": "D" },
                { "source": "E", "target": "D" },
                { "source": "D", "target": "end" }
            ]
        });
        let mut runner = start(net, Vars::new());
        runner.fire("A").unwrap();

        for (fired, task) in order.iter().enumerate() {
            prop_assert!(runner.enabled().iter().all(|e| e.task != "D"), "D enabled after {} branches", fired);
            runner.fire(task).unwrap();
        }
        let result = runner.fire("D").unwrap();
        prop_assert_eq!(result.consumed.len(), 3);
        prop_assert_eq!(runner.status(), CaseStatus::Completed);
    }

    #[test]
    fn instance_threshold_ignores_completion_order(
        (count, threshold, order) in (1usize..6)
            .prop_flat_map(|n| (Just(n), 1..=n, Just((0..n).collect::<Vec<usize>>()).prop_shuffle())),
    ) {
        let net = json!({
            "id": "main", "input": "start", "output": "end",
            "variables": [{ "name": "items", "initial": [] }, { "name": "results" }],
            "tasks": [{
                "id": "M", "kind": "multi_instance",
                "multi_instance": { "min": 1, "max": 8, "threshold": threshold, "splitting": "items", "joining": "results" }
            }],
            "flows": [{ "source": "start", "target": "M" }, { "source": "M", "target": "end" }]
        });
        let items: Vec<usize> = (0..count).collect();
        let mut runner = start(net, Vars::new().with("items", json!(items)));
        runner.fire("M").unwrap();

        let mut instances: BTreeMap<usize, String> = BTreeMap::new();
        for item in runner.work_items().filter(|w| w.is_instance()) {
            instances.insert(item.instance.unwrap_or_default(), item.id.clone());
        }
        prop_assert_eq!(instances.len(), count);

        for (done, index) in order.iter().take(threshold).enumerate() {
            prop_assert!(runner.enabled().is_empty(), "synchronized after {} of {}", done, threshold);
            runner.complete_work_item(&instances[index], Vars::new().with("results", *index)).unwrap();
        }
        let enabled = runner.enabled();
        prop_assert_eq!(enabled.len(), 1);
        prop_assert_eq!(enabled[0].mode, EnableMode::Synchronize);

        let result = runner.fire("M").unwrap();
        prop_assert_eq!(result.cancelled_work_items.len(), count - threshold);

        let mut expected: Vec<usize> = order.iter().take(threshold).cloned().collect();
        expected.sort();
        prop_assert_eq!(runner.data().get_value("results"), Some(&json!(expected)));
        prop_assert_eq!(runner.status(), CaseStatus::Completed);
    }
}

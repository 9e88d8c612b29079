//! End-to-end plan-subsystem scenarios (spec.md §8, scenario 1: "Planned
//! sequence with failure escalation").

use gearbox::prelude::*;

struct Ctx;
struct TestDomain;
impl Domain for TestDomain {
    type Context = Ctx;
    type Event = ();
}

/// A leaf that reports success on every `update`, advancing whatever plan
/// task it is the origin of.
struct SucceedsImmediately;
impl UserState<TestDomain> for SucceedsImmediately {
    fn update(&mut self, _ctx: &mut Ctx, control: &mut FullControl) -> Status {
        control.succeed()
    }
}

/// A leaf that always fails, clearing its region's remaining plan.
struct FailsImmediately;
impl UserState<TestDomain> for FailsImmediately {
    fn update(&mut self, _ctx: &mut Ctx, control: &mut FullControl) -> Status {
        control.fail()
    }
}

/// A composite head running its own children as a behavior-tree-style
/// chain: builds the chain on entry. Reports its own completion to *its*
/// parent's plan purely through the default `plan_succeeded` hook, which the
/// engine invokes once this region's own plan empties out.
#[derive(Default)]
struct SequenceHead;
impl UserState<TestDomain> for SequenceHead {
    fn enter(&mut self, _ctx: &mut Ctx, control: &mut PlanControl) {
        control.add_task(3, 4).unwrap(); // Step1_1 -> Step1_2
        control.add_task(4, 5).unwrap(); // Step1_2 -> Step1_3
    }
}

/// Planned's own one-task plan: once its behavior-tree child (Step1_BT)
/// reports success, move on to Terminal.
struct PlannedHead;
impl UserState<TestDomain> for PlannedHead {
    fn enter(&mut self, _ctx: &mut Ctx, control: &mut PlanControl) {
        control.add_task(2, 6).unwrap(); // Step1_BT -> Terminal
    }
}

fn planned_sequence_tree() -> MachineDescriptor {
    DescriptorBuilder::new()
        .build(Node::orthogonal(vec![
            // Planned { Step1_BT{Step1_1,Step1_2,Step1_3}, Terminal }
            Node::composite(
                Strategy::Composite,
                vec![
                    Node::composite(Strategy::Composite, vec![Node::Leaf, Node::Leaf, Node::Leaf]),
                    Node::Leaf,
                ],
            ),
            // Unplanned { Work_1, Work_2 }
            Node::composite(Strategy::Composite, vec![Node::Leaf, Node::Leaf]),
        ]))
        .unwrap()
}

// State ids in this tree, by pre-order construction:
// 0 root(ortho)
// 1 Planned(compo)
// 2 Step1_BT(compo)
// 3 Step1_1  4 Step1_2  5 Step1_3
// 6 Terminal
// 7 Unplanned(compo)
// 8 Work_1  9 Work_2

fn planned_sequence_states() -> Vec<StateSlot<TestDomain>> {
    vec![
        StateSlot::new(Box::new(EmptyState)),        // 0 root
        StateSlot::new(Box::new(PlannedHead)),        // 1 Planned
        StateSlot::new(Box::new(SequenceHead::default())), // 2 Step1_BT
        StateSlot::new(Box::new(SucceedsImmediately)), // 3 Step1_1
        StateSlot::new(Box::new(SucceedsImmediately)), // 4 Step1_2
        StateSlot::new(Box::new(SucceedsImmediately)), // 5 Step1_3
        StateSlot::new(Box::new(SucceedsImmediately)), // 6 Terminal
        StateSlot::new(Box::new(EmptyState)),        // 7 Unplanned
        StateSlot::new(Box::new(EmptyState)),        // 8 Work_1
        StateSlot::new(Box::new(EmptyState)),        // 9 Work_2
    ]
}

#[test]
fn planned_sequence_advances_one_step_per_update_then_escalates() {
    let descriptor = std::sync::Arc::new(planned_sequence_tree());
    let mut machine: Machine<TestDomain> =
        Machine::new(descriptor, planned_sequence_states(), StepRandomSource::new(7));

    // The first `update` both performs initial entry and immediately
    // dispatches the freshly-entered tree, so Step1_1's own `update` call
    // (SucceedsImmediately) already reports success this same tick,
    // advancing Step1_BT's plan one step to Step1_2.
    machine.update(&mut Ctx);
    assert!(machine.is_active(0));
    assert!(machine.is_active(1));
    assert!(machine.is_active(2));
    assert!(machine.is_active(4)); // Step1_2
    assert!(!machine.is_active(3));
    assert!(machine.is_active(7));
    assert!(machine.is_active(8)); // Work_1, untouched by any of this

    // Second update: Step1_2 succeeds, emptying Step1_BT's own plan. The
    // engine invokes SequenceHead's (default) planSucceeded hook, which
    // reports Step1_BT's own success to Planned's plan; that plan in turn
    // empties out and escalates through PlannedHead's own planSucceeded,
    // landing on Terminal — all within this one update call, so Step1_3 is
    // never actually entered.
    machine.update(&mut Ctx);
    assert!(machine.is_active(6)); // Terminal
    assert!(!machine.is_active(2)); // Step1_BT's whole subtree exited
    assert!(!machine.is_active(4));
    assert!(!machine.is_active(5));

    // Unplanned was never touched by any of this.
    assert!(machine.is_active(8));

    // A further update is a no-op: Terminal and Planned have no more plan.
    machine.update(&mut Ctx);
    assert!(machine.is_active(6));
}

#[test]
fn failing_task_clears_remaining_plan_without_requesting_a_transition() {
    let descriptor = std::sync::Arc::new(
        DescriptorBuilder::new()
            .build(Node::composite(Strategy::Composite, vec![Node::Leaf, Node::Leaf, Node::Leaf]))
            .unwrap(),
    );
    struct FailFastHead;
    impl UserState<TestDomain> for FailFastHead {
        fn enter(&mut self, _ctx: &mut Ctx, control: &mut PlanControl) {
            control.add_task(1, 2).unwrap();
            control.add_task(2, 3).unwrap();
        }
    }
    let states: Vec<StateSlot<TestDomain>> = vec![
        StateSlot::new(Box::new(FailFastHead)),
        StateSlot::new(Box::new(FailsImmediately)),
        StateSlot::new(Box::new(EmptyState)),
        StateSlot::new(Box::new(EmptyState)),
    ];
    let mut machine: Machine<TestDomain> = Machine::new(descriptor, states, StepRandomSource::new(1));

    machine.update(&mut Ctx);
    assert!(machine.is_active(1));

    machine.update(&mut Ctx);
    // The failure clears the plan but issues no transition request: the
    // active leaf is unchanged.
    assert!(machine.is_active(1));
}

//! End-to-end control-flow scenarios (spec.md §8, scenarios 2-6): guard
//! veto, resume semantics, utility/random selection, schedule persistence,
//! and outer-transition detection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gearbox::prelude::*;

struct Ctx;
struct TestDomain;
impl Domain for TestDomain {
    type Context = Ctx;
    type Event = ();
}

fn slots(behaviors: Vec<Box<dyn UserState<TestDomain>>>) -> Vec<StateSlot<TestDomain>> {
    behaviors.into_iter().map(StateSlot::new).collect()
}

// ---- Scenario 2: guard veto ----

struct AlwaysVetoEntry;
impl UserState<TestDomain> for AlwaysVetoEntry {
    fn entry_guard(&mut self, _ctx: &mut Ctx, control: &mut GuardControl) {
        control.cancel_pending_transitions();
    }
}

#[test]
fn guard_veto_leaves_active_set_unchanged() {
    // root(compo Composite) { A(leaf), B(leaf, vetoes every entry) }
    let descriptor = Arc::new(
        DescriptorBuilder::new()
            .build(Node::composite(Strategy::Composite, vec![Node::Leaf, Node::Leaf]))
            .unwrap(),
    );
    let states = slots(vec![Box::new(EmptyState), Box::new(EmptyState), Box::new(AlwaysVetoEntry)]);
    let mut machine: Machine<TestDomain> = Machine::new(descriptor, states, StepRandomSource::new(3));

    machine.update(&mut Ctx);
    assert!(machine.is_active(1)); // A, restart-default

    machine.change_to(2); // B
    machine.update(&mut Ctx);

    assert!(machine.is_active(1), "A should remain active after a vetoed entry");
    assert!(!machine.is_active(2), "B's entry_guard should have blocked it");
}

// ---- Scenario 3: resume semantics ----

#[test]
fn resume_reselects_the_last_active_prong() {
    // root(compo) { C(compo) { A(leaf), B(leaf) }, D(leaf) }
    let descriptor = Arc::new(
        DescriptorBuilder::new()
            .build(Node::composite(
                Strategy::Composite,
                vec![
                    Node::composite(Strategy::Composite, vec![Node::Leaf, Node::Leaf]),
                    Node::Leaf,
                ],
            ))
            .unwrap(),
    );
    // 0 root, 1 C, 2 A, 3 B, 4 D
    let states = slots(vec![
        Box::new(EmptyState),
        Box::new(EmptyState),
        Box::new(EmptyState),
        Box::new(EmptyState),
        Box::new(EmptyState),
    ]);
    let mut machine: Machine<TestDomain> = Machine::new(descriptor, states, StepRandomSource::new(5));

    machine.update(&mut Ctx);
    assert!(machine.is_active(2)); // A by default

    machine.change_to(3); // B
    machine.update(&mut Ctx);
    assert!(machine.is_active(3));

    machine.change_to(2); // A
    machine.update(&mut Ctx);
    assert!(machine.is_active(2));

    machine.resume(1); // resume(C)
    machine.update(&mut Ctx);
    assert!(machine.is_active(3), "resume should reselect B, the last-active prong");
    assert!(!machine.is_active(2));
}

// ---- Scenario 4: utility pick ----

struct FixedUtility(f32);
impl UserState<TestDomain> for FixedUtility {
    fn utility(&self, _ctx: &Ctx) -> f32 {
        self.0
    }
}

#[test]
fn utilize_picks_the_argmax_child() {
    // root(compo) { UtilHead(compo, default Composite) { X, Y, Z }, Sibling(leaf) }
    let descriptor = Arc::new(
        DescriptorBuilder::new()
            .build(Node::composite(
                Strategy::Composite,
                vec![
                    Node::composite(Strategy::Composite, vec![Node::Leaf, Node::Leaf, Node::Leaf]),
                    Node::Leaf,
                ],
            ))
            .unwrap(),
    );
    // 0 root, 1 UtilHead, 2 X, 3 Y, 4 Z, 5 Sibling
    let states = slots(vec![
        Box::new(EmptyState),
        Box::new(EmptyState),
        Box::new(FixedUtility(0.4)),
        Box::new(FixedUtility(0.9)),
        Box::new(FixedUtility(0.5)),
        Box::new(EmptyState),
    ]);
    let mut machine: Machine<TestDomain> = Machine::new(descriptor, states, StepRandomSource::new(11));

    machine.update(&mut Ctx);
    assert!(machine.is_active(2)); // X by the region's own restart-default strategy

    machine.utilize(1); // force Utilitarian selection on UtilHead's region
    machine.update(&mut Ctx);
    assert!(machine.is_active(3), "Y has the highest utility (0.9)");
    assert!(!machine.is_active(2));
    assert!(!machine.is_active(4));
}

// ---- Scenario 5: random pick determinism ----

struct RankedUtility {
    rank: i32,
    utility: f32,
}
impl UserState<TestDomain> for RankedUtility {
    fn rank(&self, _ctx: &Ctx) -> i32 {
        self.rank
    }
    fn utility(&self, _ctx: &Ctx) -> f32 {
        self.utility
    }
}

#[test]
fn random_util_only_ever_selects_the_top_ranked_child() {
    // root(compo, RandomUtil) { X(rank 1), Y(rank 2), Z(rank 1) }
    let descriptor = Arc::new(
        DescriptorBuilder::new()
            .build(Node::composite(Strategy::RandomUtil, vec![Node::Leaf, Node::Leaf, Node::Leaf]))
            .unwrap(),
    );
    for seed in [1u64, 2, 3, 99, 1000] {
        let states = slots(vec![
            Box::new(RankedUtility { rank: 1, utility: 0.3 }),
            Box::new(RankedUtility { rank: 2, utility: 0.7 }),
            Box::new(RankedUtility { rank: 1, utility: 0.4 }),
        ]);
        let mut machine: Machine<TestDomain> = Machine::new(descriptor.clone(), states, StepRandomSource::new(seed));
        machine.update(&mut Ctx);
        assert!(machine.is_active(1), "seed {seed}: Y is the only rank-2 child, must always win");
        assert!(machine.is_active(0));
    }
}

// ---- Scenario 6: schedule persists across exit ----

#[test]
fn schedule_is_honored_by_a_later_resume() {
    // root(compo) { Filler(leaf), R(compo) { S(leaf), T(leaf) } }
    let descriptor = Arc::new(
        DescriptorBuilder::new()
            .build(Node::composite(
                Strategy::Composite,
                vec![Node::Leaf, Node::composite(Strategy::Composite, vec![Node::Leaf, Node::Leaf])],
            ))
            .unwrap(),
    );
    // 0 root, 1 Filler, 2 R, 3 S, 4 T
    let states = slots(vec![
        Box::new(EmptyState),
        Box::new(EmptyState),
        Box::new(EmptyState),
        Box::new(EmptyState),
        Box::new(EmptyState),
    ]);
    let mut machine: Machine<TestDomain> = Machine::new(descriptor, states, StepRandomSource::new(2));

    machine.update(&mut Ctx);
    assert!(machine.is_active(1)); // Filler, R never entered yet
    assert!(!machine.is_active(2));

    machine.schedule(3); // schedule(S) while R is still inactive
    assert!(machine.is_scheduled(3));

    machine.resume(2); // resume(R)
    machine.update(&mut Ctx);

    assert!(machine.is_active(2)); // R
    assert!(machine.is_active(3), "S was scheduled and should be the resumed child");
    assert!(!machine.is_active(4));
}

// ---- Outer-transition detection, observed through a live machine ----

struct RequestsOutsideOwnSubtree {
    target: StateId,
    observed: Arc<AtomicBool>,
}
impl UserState<TestDomain> for RequestsOutsideOwnSubtree {
    fn update(&mut self, _ctx: &mut Ctx, control: &mut FullControl) -> Status {
        control.change_to(self.target);
        self.observed.store(control.has_outer_request(), Ordering::SeqCst);
        Status::NONE
    }
}

#[test]
fn full_control_flags_requests_outside_the_current_subtree() {
    // root(compo) { Branch(compo) { Leaf1, Leaf2 }, Other(leaf) }
    let descriptor = Arc::new(
        DescriptorBuilder::new()
            .build(Node::composite(
                Strategy::Composite,
                vec![
                    Node::composite(Strategy::Composite, vec![Node::Leaf, Node::Leaf]),
                    Node::Leaf,
                ],
            ))
            .unwrap(),
    );
    // 0 root, 1 Branch, 2 Leaf1, 3 Leaf2, 4 Other
    let observed = Arc::new(AtomicBool::new(false));
    let states = slots(vec![
        Box::new(EmptyState),
        Box::new(EmptyState),
        Box::new(RequestsOutsideOwnSubtree { target: 4, observed: observed.clone() }),
        Box::new(EmptyState),
        Box::new(EmptyState),
    ]);
    let mut machine: Machine<TestDomain> = Machine::new(descriptor, states, StepRandomSource::new(4));

    machine.update(&mut Ctx);
    assert!(observed.load(Ordering::SeqCst), "changeTo(Other) from Leaf1 reaches outside Leaf1's own subtree");
    assert!(machine.is_active(4)); // the request committed this same tick
}

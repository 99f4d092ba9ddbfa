use std::any::Any;

use cloudsim_kernel::domain::cloud_model::utils::id::HostId;
use cloudsim_kernel::domain::simulator::sim_entity::{EntityId, SimContext, SimEntity};
use cloudsim_kernel::domain::simulator::sim_event::SimEvent;
use cloudsim_kernel::domain::simulator::sim_message::SimMessage;
use cloudsim_kernel::domain::simulator::simulation::{Simulation, SimulationState};

/// Logs every event it receives as (clock, message kind, tag).
#[derive(Debug, Default)]
struct Recorder {
    log: Vec<(f64, &'static str, u32)>,
}

impl SimEntity for Recorder {
    fn on_start(&mut self, _ctx: &mut SimContext) {}

    fn on_event(&mut self, ctx: &mut SimContext, event: SimEvent) {
        let tag = match event.message {
            SimMessage::Custom { tag, .. } => tag,
            _ => 0,
        };
        self.log.push((ctx.clock(), event.message.as_str(), tag));
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Sends `plan` to the target on start, then cancels its own pending even-tagged events at 2.5.
#[derive(Debug)]
struct Sender {
    target: String,
    plan: Vec<(f64, u32)>,
    cancelled: usize,
}

impl SimEntity for Sender {
    fn on_start(&mut self, ctx: &mut SimContext) {
        let recorder = ctx.entity_by_name(&self.target).unwrap();
        for (delay, tag) in self.plan.iter() {
            ctx.schedule(recorder, *delay, SimMessage::Custom { tag: *tag, data: String::new() });
        }
        ctx.schedule_self(2.5, SimMessage::Custom { tag: 0, data: "cancel".to_string() });
    }

    fn on_event(&mut self, ctx: &mut SimContext, event: SimEvent) {
        if let SimMessage::Custom { data, .. } = event.message {
            if data == "cancel" {
                self.cancelled = ctx.cancel_own(|e| matches!(e.message, SimMessage::Custom { tag, .. } if tag % 2 == 0));
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn custom(tag: u32) -> SimMessage {
    SimMessage::Custom { tag, data: String::new() }
}

fn recorder_log(simulation: &Simulation, recorder: EntityId) -> Vec<(f64, &'static str, u32)> {
    simulation.entity::<Recorder>(recorder).unwrap().log.clone()
}

#[test]
fn test_equal_times_dispatch_by_priority_then_submission_order() {
    let mut simulation = Simulation::new();
    let recorder = simulation.add_entity("recorder", Recorder::default()).unwrap();

    simulation.send(recorder, 1.0, custom(1));
    simulation.send(recorder, 1.0, SimMessage::EndOfSimulation);
    simulation.send(recorder, 1.0, custom(2));
    simulation.send(recorder, 1.0, SimMessage::HostPeFailure { host_id: HostId::new(0), pes: 1 });
    simulation.send(recorder, 0.5, custom(3));
    simulation.send(recorder, 1.0, custom(4));

    assert_eq!(simulation.start(), 1.0);
    assert_eq!(
        recorder_log(&simulation, recorder),
        vec![
            (0.5, "Custom", 3),
            (1.0, "HostPeFailure", 0),
            (1.0, "Custom", 1),
            (1.0, "Custom", 2),
            (1.0, "Custom", 4),
            (1.0, "EndOfSimulation", 0),
        ]
    );
}

#[test]
fn test_cancel_only_touches_own_events() {
    let mut simulation = Simulation::new();
    let recorder = simulation.add_entity("recorder", Recorder::default()).unwrap();
    simulation.add_entity("sender", Sender { target: "recorder".to_string(), plan: vec![(1.0, 1), (3.0, 2), (4.0, 3), (5.0, 4)], cancelled: 0 }).unwrap();

    // Same tags, sent from outside: never cancelled by the sender.
    simulation.send(recorder, 3.0, custom(2));
    simulation.send(recorder, 5.0, custom(4));

    assert_eq!(simulation.count_events(|_| true), 2);
    simulation.start();

    let sender = simulation.entity_by_name::<Sender>("sender").unwrap();
    assert_eq!(sender.cancelled, 2);
    let tags: Vec<(f64, u32)> = recorder_log(&simulation, recorder).into_iter().map(|(t, _, tag)| (t, tag)).collect();
    assert_eq!(tags, vec![(1.0, 1), (3.0, 2), (4.0, 3), (5.0, 4)]);
}

#[test]
fn test_pause_resume_and_count_events() {
    let mut simulation = Simulation::new();
    let recorder = simulation.add_entity("recorder", Recorder::default()).unwrap();
    for (delay, tag) in [(1.0, 1), (2.0, 2), (3.0, 3), (10.0, 4)] {
        simulation.send(recorder, delay, custom(tag));
    }

    assert!(simulation.pause(2.0));
    assert_eq!(simulation.start(), 2.0);
    assert_eq!(simulation.get_state(), SimulationState::Paused);
    assert_eq!(simulation.count_events(|e| e.time > 2.0), 2);

    assert!(!simulation.pause(1.0));
    assert!(simulation.pause(5.0));
    assert_eq!(simulation.resume(), 5.0);
    assert_eq!(recorder_log(&simulation, recorder).len(), 3);

    simulation.terminate();
    assert_eq!(simulation.get_state(), SimulationState::Terminated);
    assert_eq!(simulation.clock(), 5.0);
    assert_eq!(recorder_log(&simulation, recorder).len(), 3);
}

#[test]
fn test_entities_added_while_paused_start_immediately() {
    let mut simulation = Simulation::new();
    let recorder = simulation.add_entity("recorder", Recorder::default()).unwrap();
    simulation.send(recorder, 4.0, custom(1));
    simulation.pause(2.0);
    simulation.start();

    simulation.add_entity("sender", Sender { target: "recorder".to_string(), plan: vec![(1.0, 9)], cancelled: 0 }).unwrap();

    simulation.resume();
    assert_eq!(recorder_log(&simulation, recorder), vec![(3.0, "Custom", 9), (4.0, "Custom", 1)]);
}

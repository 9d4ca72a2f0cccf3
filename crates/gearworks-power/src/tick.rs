use crate::MechanicalModule;
use gearworks_core::event::MechanicalEvent;
use gearworks_core::fixed::{checked_div_64, clamp_symmetric, wrap_angle, Fixed64, Ticks};

impl MechanicalModule {
    /// Advance every network's rotational state by one tick.
    ///
    /// For each network:
    /// 1. `accel = (torque - resistance * speed) / max(inertia, min_inertia)`.
    /// 2. Integrate speed (clamped to `max_speed`), then angle (wrapped).
    /// 3. Emit started/stopped events on transitions across `stop_threshold`.
    ///
    /// A network is advanced at most once per tick value, so calling this
    /// twice with the same tick is harmless. Returns the events emitted.
    pub fn tick(&mut self, current_tick: Ticks) -> Vec<MechanicalEvent> {
        self.tick = current_tick;
        let dt = self.config.dt();
        let max_speed = self.config.max_speed;
        let threshold = self.config.stop_threshold;
        let min_inertia = self.config.min_inertia;
        let mut events = Vec::new();

        for net in self.networks.iter_mut() {
            if net.last_advanced == Some(current_tick) {
                continue;
            }
            net.last_advanced = Some(current_tick);

            let drag = net.total_resistance().saturating_mul(net.angular_speed);
            let drive = net.total_torque().saturating_sub(drag);
            let inertia = net.total_inertia().max(min_inertia);
            let accel = checked_div_64(drive, inertia).unwrap_or(Fixed64::ZERO);

            let speed = net.angular_speed.saturating_add(accel.saturating_mul(dt));
            net.angular_speed = clamp_symmetric(speed, max_speed);
            net.angle = wrap_angle(net.angle + net.angular_speed * dt);

            // Events fire only on transitions.
            let running = net.angular_speed.abs() > threshold;
            if running && !net.was_running {
                events.push(MechanicalEvent::NetworkStarted {
                    network: net.id,
                    tick: current_tick,
                });
            } else if !running && net.was_running {
                events.push(MechanicalEvent::NetworkStopped {
                    network: net.id,
                    tick: current_tick,
                });
            }
            net.was_running = running;
        }

        events
    }
}

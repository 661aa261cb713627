//! Synchronous actuator bus: opens the serial port, enables/disables torque,
//! and broadcasts synchronized goal positions to all twelve motors.
//!
//! Unlike the adapters elsewhere in this codebase, this driver is
//! deliberately synchronous: the control loop runs on a plain OS thread and
//! must observe a broadcast complete (or fail) before its next tick, with no
//! intervening async scheduling.

use std::time::Duration;

use tracing::{debug, warn};

use crate::actuator::protocol::{
    build_sync_write_packet, build_write_packet, goal_position_bytes, ADDR_GOAL_POSITION,
    ADDR_TORQUE_ENABLE, LEN_GOAL_POSITION,
};
use crate::error::{HexError, HexResult};
use crate::gait::library::deg_to_raw;

/// Fixed motor id ordering used for every broadcast.
pub const MOTOR_IDS: [u8; 12] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];

/// Owns the serial port. Not `Clone` or `Sync` by design: the bus is singly
/// owned by the control loop (see SPEC_FULL.md section 5).
pub struct ActuatorBus {
    port: Box<dyn serialport::SerialPort>,
}

impl ActuatorBus {
    /// Open the serial port at the given device path and baud rate.
    pub fn open(device: &str, baud: u32) -> HexResult<Self> {
        let port = serialport::new(device, baud)
            .timeout(Duration::from_millis(200))
            .open()
            .map_err(|e| HexError::Port(format!("failed to open {device}: {e}")))?;
        Ok(Self { port })
    }

    /// Enable torque on every motor in `ids`, one write per motor.
    pub fn enable_torque(&mut self, ids: &[u8]) -> HexResult<()> {
        self.write_torque(ids, true)
    }

    /// Disable torque on every motor in `ids`, one write per motor.
    pub fn disable_torque(&mut self, ids: &[u8]) -> HexResult<()> {
        self.write_torque(ids, false)
    }

    fn write_torque(&mut self, ids: &[u8], enabled: bool) -> HexResult<()> {
        for &id in ids {
            let packet = build_write_packet(id, ADDR_TORQUE_ENABLE, &[enabled as u8]);
            self.port
                .write_all(&packet)
                .map_err(|e| HexError::Port(format!("torque write to motor {id} failed: {e}")))?;
        }
        Ok(())
    }

    /// Broadcast a synchronized goal-position write for all 12 motors in a
    /// single bus transaction. `angles_deg` is indexed by motor slot
    /// (slot `i` drives motor id `i + 1`).
    pub fn broadcast_goal_positions(&mut self, angles_deg: &[f32; 12]) -> HexResult<()> {
        let entries: Vec<(u8, Vec<u8>)> = MOTOR_IDS
            .iter()
            .zip(angles_deg.iter())
            .map(|(&id, &deg)| {
                let raw = deg_to_raw(deg);
                (id, goal_position_bytes(raw).to_vec())
            })
            .collect();

        let packet =
            build_sync_write_packet(ADDR_GOAL_POSITION, LEN_GOAL_POSITION, &entries);

        self.port.write_all(&packet).map_err(|e| {
            HexError::Port(format!("sync-write broadcast failed: {e}"))
        })?;
        debug!(motors = entries.len(), "broadcast goal positions");
        Ok(())
    }

    /// Disable torque on all motors and close the port. Errors are logged,
    /// not propagated: shutdown must proceed regardless.
    pub fn close(mut self) {
        if let Err(e) = self.disable_torque(&MOTOR_IDS) {
            warn!(error = %e, "failed to disable torque during shutdown");
        }
        // Dropping `self.port` closes the underlying file descriptor.
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Static reason-group tables. Keeping these as data rather than a large
//! match/switch makes the state machine a pure function of tables and input.

use crate::model::Reason;

/// A mutually-exclusive alert group, or the connection singleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// This reason is terminal: it resolves every active alert at the key.
    Terminal,
    /// This reason clears every member of `group` without asserting a new alert.
    ClearGroup { group: &'static [Reason] },
    /// This reason asserts an alert, exclusive against the other members of `group`.
    SetAlert { group: &'static [Reason] },
}

const APPLICATION_GROUP: &[Reason] =
    &[Reason::DeviceApplicationDegraded, Reason::DeviceApplicationError];
const CPU_GROUP: &[Reason] = &[Reason::DeviceCPUWarning, Reason::DeviceCPUCritical];
const MEMORY_GROUP: &[Reason] = &[Reason::DeviceMemoryWarning, Reason::DeviceMemoryCritical];
const DISK_GROUP: &[Reason] = &[Reason::DeviceDiskWarning, Reason::DeviceDiskCritical];
/// The connection group is a singleton: `Disconnected` has no sibling to exclude.
const CONNECTION_GROUP: &[Reason] = &[Reason::DeviceDisconnected];

/// Classify a reason: which group (if any) it belongs to, and what kind of
/// transition it drives.
pub fn classify(reason: Reason) -> Classification {
    match reason {
        Reason::ResourceDeleted | Reason::DeviceDecommissioned => Classification::Terminal,

        Reason::DeviceApplicationDegraded | Reason::DeviceApplicationError => {
            Classification::SetAlert { group: APPLICATION_GROUP }
        }
        Reason::DeviceApplicationHealthy => Classification::ClearGroup { group: APPLICATION_GROUP },

        Reason::DeviceCPUWarning | Reason::DeviceCPUCritical => {
            Classification::SetAlert { group: CPU_GROUP }
        }
        Reason::DeviceCPUNormal => Classification::ClearGroup { group: CPU_GROUP },

        Reason::DeviceMemoryWarning | Reason::DeviceMemoryCritical => {
            Classification::SetAlert { group: MEMORY_GROUP }
        }
        Reason::DeviceMemoryNormal => Classification::ClearGroup { group: MEMORY_GROUP },

        Reason::DeviceDiskWarning | Reason::DeviceDiskCritical => {
            Classification::SetAlert { group: DISK_GROUP }
        }
        Reason::DeviceDiskNormal => Classification::ClearGroup { group: DISK_GROUP },

        Reason::DeviceDisconnected => Classification::SetAlert { group: CONNECTION_GROUP },
        Reason::DeviceConnected => Classification::ClearGroup { group: CONNECTION_GROUP },
    }
}

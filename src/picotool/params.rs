//! Operation Parameters
//!
//! Typed parameter sets for each supported picotool operation. Every field has a
//! default so a `tools/call` with an empty (or missing) `arguments` object decodes
//! into the same invocation picotool would get with no flags at all.

use serde::{Deserialize, Serialize};

/// Filters that narrow which connected USB device a command targets.
///
/// All supplied fields are ANDed by picotool. Empty strings are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSelector {
    /// USB bus number
    pub bus: Option<String>,

    /// USB device address
    pub address: Option<String>,

    /// Vendor ID
    pub vid: Option<String>,

    /// Product ID
    pub pid: Option<String>,

    /// Serial number
    pub serial: Option<String>,
}

impl DeviceSelector {
    /// Selector fields paired with their picotool flag, in the order picotool expects.
    pub fn flags(&self) -> [(&'static str, Option<&str>); 5] {
        [
            ("--bus", self.bus.as_deref()),
            ("--address", self.address.as_deref()),
            ("--vid", self.vid.as_deref()),
            ("--pid", self.pid.as_deref()),
            ("--ser", self.serial.as_deref()),
        ]
    }

    /// True when no selector field carries a value.
    pub fn is_empty(&self) -> bool {
        self.flags()
            .iter()
            .all(|(_, value)| value.map_or(true, str::is_empty))
    }
}

/// How picotool should treat a device that is not in BOOTSEL mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ForceMode {
    /// Only talk to devices already in BOOTSEL mode
    #[default]
    None,

    /// Reset the device into BOOTSEL, run the command, reboot back
    Force,

    /// Reset the device into BOOTSEL and leave it there
    ForceNoReboot,
}

impl ForceMode {
    /// Derive the mode from the two request booleans. `force` takes priority.
    pub fn from_flags(force: bool, force_no_reboot: bool) -> Self {
        if force {
            Self::Force
        } else if force_no_reboot {
            Self::ForceNoReboot
        } else {
            Self::None
        }
    }

    pub fn flag(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Force => Some("-f"),
            Self::ForceNoReboot => Some("-F"),
        }
    }
}

/// Request-level force switches, shared by every device-facing operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceOptions {
    pub force: bool,
    pub force_no_reboot: bool,
}

impl ForceOptions {
    pub fn mode(&self) -> ForceMode {
        ForceMode::from_flags(self.force, self.force_no_reboot)
    }
}

/// Parameters for `picotool info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfoParams {
    /// File to inspect; empty means the connected device
    pub target: String,
    pub basic: bool,
    pub metadata: bool,
    pub pins: bool,
    pub device: bool,
    pub debug: bool,
    pub build: bool,
    /// Subsumes every individual information flag
    pub all: bool,
    #[serde(flatten)]
    pub force: ForceOptions,
    #[serde(flatten)]
    pub selector: DeviceSelector,
}

impl Default for InfoParams {
    fn default() -> Self {
        Self {
            target: String::new(),
            basic: true,
            metadata: false,
            pins: false,
            device: false,
            debug: false,
            build: false,
            all: false,
            force: ForceOptions::default(),
            selector: DeviceSelector::default(),
        }
    }
}

/// Parameters for `picotool reboot`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebootParams {
    pub all_devices: bool,
    /// Reboot into BOOTSEL (USB mass storage) instead of the application
    pub usb_mass_storage: bool,
    pub partition: Option<String>,
    /// `ARM` or `RISC-V` (RP2350 only)
    pub cpu: Option<String>,
    #[serde(flatten)]
    pub force: ForceOptions,
    #[serde(flatten)]
    pub selector: DeviceSelector,
}

/// Parameters for `picotool partition info`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionInfoParams {
    /// Family to show the partition for, e.g. `rp2350-arm-s`
    pub family_id: Option<String>,
    #[serde(flatten)]
    pub force: ForceOptions,
    #[serde(flatten)]
    pub selector: DeviceSelector,
}

/// Parameters for `picotool erase`.
///
/// `all_flash`, `sector` and the range are distinct erase modes. They are not
/// checked for exclusivity here; picotool rejects contradictory requests itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EraseParams {
    pub all_flash: bool,
    /// Address inside the sector to erase
    pub sector: Option<String>,
    pub range_start: Option<String>,
    pub range_end: Option<String>,
    #[serde(flatten)]
    pub force: ForceOptions,
    #[serde(flatten)]
    pub selector: DeviceSelector,
}

/// The closed set of picotool operations exposed as MCP tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Info(InfoParams),
    Reboot(RebootParams),
    Version,
    PartitionInfo(PartitionInfoParams),
    Erase(EraseParams),
}

/// Tool names paired with the short operation label used in messages.
pub const TOOL_NAMES: [(&str, &str); 5] = [
    ("picotool_info", "info"),
    ("picotool_reboot", "reboot"),
    ("picotool_version", "version"),
    ("picotool_partition_info", "partition info"),
    ("picotool_erase", "erase"),
];

/// Why a `tools/call` could not be turned into an [`Operation`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParamsError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
}

impl Operation {
    /// Decode tool arguments into a typed operation.
    ///
    /// `arguments` may be `null`; it is then treated as an empty object.
    /// Keys whose value is `null` are treated as absent and take their default.
    pub fn from_tool_call(name: &str, arguments: serde_json::Value) -> Result<Self, ParamsError> {
        let arguments = match arguments {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            serde_json::Value::Object(mut map) => {
                map.retain(|_, value| !value.is_null());
                serde_json::Value::Object(map)
            }
            other => other,
        };

        let invalid = |e: serde_json::Error| ParamsError::InvalidArguments {
            tool: name.to_string(),
            reason: e.to_string(),
        };

        match name {
            "picotool_info" => serde_json::from_value(arguments).map(Self::Info).map_err(invalid),
            "picotool_reboot" => serde_json::from_value(arguments)
                .map(Self::Reboot)
                .map_err(invalid),
            "picotool_version" => Ok(Self::Version),
            "picotool_partition_info" => serde_json::from_value(arguments)
                .map(Self::PartitionInfo)
                .map_err(invalid),
            "picotool_erase" => serde_json::from_value(arguments)
                .map(Self::Erase)
                .map_err(invalid),
            other => Err(ParamsError::UnknownTool(other.to_string())),
        }
    }

    /// MCP tool name for this operation
    pub fn tool_name(&self) -> &'static str {
        TOOL_NAMES[self.index()].0
    }

    /// Human-readable operation label, e.g. `partition info`
    pub fn label(&self) -> &'static str {
        TOOL_NAMES[self.index()].1
    }

    fn index(&self) -> usize {
        match self {
            Self::Info(_) => 0,
            Self::Reboot(_) => 1,
            Self::Version => 2,
            Self::PartitionInfo(_) => 3,
            Self::Erase(_) => 4,
        }
    }
}

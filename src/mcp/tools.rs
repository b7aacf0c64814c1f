//! Tool Catalog
//!
//! Static descriptions and input schemas of the picotool tools. The schemas are
//! also what the server enforces: argument keys outside a tool's `properties`
//! are rejected before any command is composed.

use crate::mcp::protocol::Tool;
use serde_json::{json, Map, Value};

fn force_properties() -> Map<String, Value> {
    let props = json!({
        "force": {
            "type": "boolean",
            "description": "Force a device not in BOOTSEL mode to reset into it (no physical button needed)",
            "default": false
        },
        "force_no_reboot": {
            "type": "boolean",
            "description": "Force device reset but don't reboot back to application mode",
            "default": false
        }
    });
    into_map(props)
}

fn selector_properties() -> Map<String, Value> {
    let props = json!({
        "bus": {"type": "string", "description": "Filter devices by USB bus number"},
        "address": {"type": "string", "description": "Filter devices by USB device address"},
        "vid": {"type": "string", "description": "Filter by vendor ID"},
        "pid": {"type": "string", "description": "Filter by product ID"},
        "serial": {"type": "string", "description": "Filter by serial number"}
    });
    into_map(props)
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Build an object schema from tool-specific properties, optionally followed by
/// the shared force and device-selection properties.
fn schema(own: Value, device_facing: bool) -> Value {
    let mut properties = into_map(own);
    if device_facing {
        properties.extend(force_properties());
        properties.extend(selector_properties());
    }
    json!({
        "type": "object",
        "properties": properties,
        "additionalProperties": false
    })
}

fn tool(name: &str, description: &str, input_schema: Value) -> Tool {
    Tool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

/// All tools offered by the server, in listing order.
pub fn catalog() -> Vec<Tool> {
    vec![
        tool(
            "picotool_info",
            "Get information about connected Pico devices or binary files. Can force running devices into BOOTSEL mode automatically.",
            schema(
                json!({
                    "target": {
                        "type": "string",
                        "description": "File path to analyze, or empty string for connected devices",
                        "default": ""
                    },
                    "basic": {"type": "boolean", "description": "Include basic information", "default": true},
                    "metadata": {"type": "boolean", "description": "Include all metadata blocks", "default": false},
                    "pins": {"type": "boolean", "description": "Include pin information", "default": false},
                    "device": {"type": "boolean", "description": "Include device information", "default": false},
                    "debug": {"type": "boolean", "description": "Include device debug information", "default": false},
                    "build": {"type": "boolean", "description": "Include build attributes", "default": false},
                    "all": {"type": "boolean", "description": "Include all information", "default": false}
                }),
                true,
            ),
        ),
        tool(
            "picotool_reboot",
            "Reboot connected Pico devices to application or BOOTSEL mode",
            schema(
                json!({
                    "all_devices": {"type": "boolean", "description": "Reboot all connected devices", "default": false},
                    "usb_mass_storage": {
                        "type": "boolean",
                        "description": "Reboot to USB mass storage mode (BOOTSEL)",
                        "default": false
                    },
                    "partition": {"type": "string", "description": "Reboot to a specific partition"},
                    "cpu": {
                        "type": "string",
                        "description": "Specify which CPU to boot (ARM/RISC-V for RP2350)",
                        "enum": ["ARM", "RISC-V"]
                    }
                }),
                true,
            ),
        ),
        tool(
            "picotool_version",
            "Get picotool version information for troubleshooting and diagnostics",
            schema(json!({}), false),
        ),
        tool(
            "picotool_partition_info",
            "Get partition table information from RP2350 devices (RP2040 devices don't have partition tables)",
            schema(
                json!({
                    "family_id": {
                        "type": "string",
                        "description": "Target family ID to show partition for (e.g. 'rp2350-arm-s', 'rp2350-riscv')"
                    }
                }),
                true,
            ),
        ),
        tool(
            "picotool_erase",
            "Erase flash memory on connected Pico devices. CAUTION: This operation is destructive and will permanently delete data.",
            schema(
                json!({
                    "all_flash": {"type": "boolean", "description": "Erase all flash memory on the device", "default": false},
                    "sector": {
                        "type": "string",
                        "description": "Erase the sector containing this address (hex, e.g. '0x10000000')"
                    },
                    "range_start": {
                        "type": "string",
                        "description": "Start address for range erase (hex, e.g. '0x10000000')"
                    },
                    "range_end": {
                        "type": "string",
                        "description": "End address for range erase (hex, e.g. '0x10100000')"
                    }
                }),
                true,
            ),
        ),
    ]
}

/// Names of argument keys `tool` accepts, read from its schema.
pub fn allowed_arguments(tool: &Tool) -> Vec<&str> {
    tool.input_schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| props.keys().map(String::as_str).collect())
        .unwrap_or_default()
}

/// Argument keys in `arguments` that `tool`'s schema does not declare.
pub fn unknown_arguments<'a>(tool: &Tool, arguments: &'a Value) -> Vec<&'a str> {
    let allowed = allowed_arguments(tool);
    match arguments.as_object() {
        Some(map) => map
            .keys()
            .map(String::as_str)
            .filter(|key| !allowed.contains(key))
            .collect(),
        None => Vec::new(),
    }
}

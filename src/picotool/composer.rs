//! Flag Composer
//!
//! Turns a typed [`Operation`] into the argument vector passed to picotool.
//!
//! picotool's own argument parser is positional: device selection options must
//! follow the target, and force options must come last. Every operation is
//! therefore lowered into an [`Invocation`] whose segments are rendered in one
//! fixed order:
//!
//! ```text
//! [subcommand] [options] [target] [selector] [force]
//! ```
//!
//! Composition never fails. Absent or empty values simply produce no tokens; a
//! malformed request becomes a command that picotool rejects on its own.

use super::params::{
    DeviceSelector, EraseParams, ForceMode, InfoParams, Operation, PartitionInfoParams,
    RebootParams,
};

/// Ordered argument vector for one picotool invocation
pub type CommandTokens = Vec<String>;

/// Segmented form of a picotool command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub subcommand: Vec<&'static str>,
    pub options: Vec<String>,
    pub target: Option<String>,
    pub selector: DeviceSelector,
    pub force: ForceMode,
}

impl Invocation {
    fn new(subcommand: &[&'static str]) -> Self {
        Self {
            subcommand: subcommand.to_vec(),
            ..Default::default()
        }
    }

    fn flag(&mut self, enabled: bool, flag: &str) {
        if enabled {
            self.options.push(flag.to_string());
        }
    }

    fn option(&mut self, flag: &str, value: Option<&str>) {
        if let Some(value) = non_empty(value) {
            self.options.push(flag.to_string());
            self.options.push(value.to_string());
        }
    }

    fn target(mut self, target: Option<&str>) -> Self {
        self.target = non_empty(target).map(str::to_string);
        self
    }

    fn device(mut self, selector: &DeviceSelector, force: ForceMode) -> Self {
        self.selector = selector.clone();
        self.force = force;
        self
    }

    /// Render the segments in picotool's positional order.
    pub fn into_tokens(self) -> CommandTokens {
        let mut tokens: CommandTokens = self.subcommand.iter().map(|s| s.to_string()).collect();
        tokens.extend(self.options);
        tokens.extend(self.target);

        for (flag, value) in self.selector.flags() {
            if let Some(value) = non_empty(value) {
                tokens.push(flag.to_string());
                tokens.push(value.to_string());
            }
        }

        if let Some(flag) = self.force.flag() {
            tokens.push(flag.to_string());
        }
        tokens
    }
}

/// Compose the picotool argument vector for `operation`.
pub fn compose(operation: &Operation) -> CommandTokens {
    lower(operation).into_tokens()
}

/// Lower an operation into its segmented invocation.
pub fn lower(operation: &Operation) -> Invocation {
    match operation {
        Operation::Info(params) => info(params),
        Operation::Reboot(params) => reboot(params),
        Operation::Version => Invocation::new(&["version"]),
        Operation::PartitionInfo(params) => partition_info(params),
        Operation::Erase(params) => erase(params),
    }
}

fn info(params: &InfoParams) -> Invocation {
    let mut inv = Invocation::new(&["info"]);

    if params.all {
        inv.flag(true, "-a");
    } else {
        inv.flag(params.basic, "-b");
        inv.flag(params.metadata, "-m");
        inv.flag(params.pins, "-p");
        inv.flag(params.device, "-d");
        inv.flag(params.debug, "--debug");
        inv.flag(params.build, "-l");
    }

    inv.target(Some(params.target.as_str()))
        .device(&params.selector, params.force.mode())
}

fn reboot(params: &RebootParams) -> Invocation {
    let mut inv = Invocation::new(&["reboot"]);
    inv.flag(params.all_devices, "-a");
    inv.flag(params.usb_mass_storage, "-u");
    inv.option("-g", params.partition.as_deref());
    inv.option("-c", params.cpu.as_deref());

    inv.device(&params.selector, params.force.mode())
}

fn partition_info(params: &PartitionInfoParams) -> Invocation {
    Invocation::new(&["partition", "info"])
        .target(params.family_id.as_deref())
        .device(&params.selector, params.force.mode())
}

fn erase(params: &EraseParams) -> Invocation {
    let mut inv = Invocation::new(&["erase"]);
    inv.flag(params.all_flash, "-a");

    if let (Some(start), Some(end)) = (
        non_empty(params.range_start.as_deref()),
        non_empty(params.range_end.as_deref()),
    ) {
        inv.options
            .extend(["-r".to_string(), start.to_string(), end.to_string()]);
    }

    if let Some(sector) = non_empty(params.sector.as_deref()) {
        let (from, to) = sector_range(sector);
        inv.options.extend(["-r".to_string(), from, to]);
    }

    inv.device(&params.selector, params.force.mode())
}

/// picotool erases every sector touched by a range, so a one-byte range starting
/// at `sector` erases exactly the containing sector. Addresses that don't parse
/// are passed through untouched for picotool to reject.
fn sector_range(sector: &str) -> (String, String) {
    match parse_address(sector) {
        Some(addr) if addr < u32::MAX => (format!("{addr:#x}"), format!("{:#x}", addr + 1)),
        _ => (sector.to_string(), sector.to_string()),
    }
}

fn parse_address(value: &str) -> Option<u32> {
    let value = value.trim();
    match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picotool::params::ForceOptions;
    use proptest::prelude::*;

    fn tokens(op: Operation) -> Vec<String> {
        compose(&op)
    }

    fn full_selector() -> DeviceSelector {
        DeviceSelector {
            bus: Some("1".into()),
            address: Some("7".into()),
            vid: Some("0x2e8a".into()),
            pid: Some("0x0003".into()),
            serial: Some("E66138".into()),
        }
    }

    #[test]
    fn test_version() {
        assert_eq!(tokens(Operation::Version), vec!["version"]);
    }

    #[test]
    fn test_info_defaults_to_basic() {
        assert_eq!(
            tokens(Operation::Info(InfoParams::default())),
            vec!["info", "-b"]
        );
    }

    #[test]
    fn test_info_all_subsumes_individual_flags() {
        let params = InfoParams {
            all: true,
            basic: true,
            metadata: true,
            pins: true,
            device: true,
            debug: true,
            build: true,
            ..Default::default()
        };
        assert_eq!(tokens(Operation::Info(params)), vec!["info", "-a"]);
    }

    #[test]
    fn test_info_canonical_flag_order() {
        let params = InfoParams {
            basic: true,
            metadata: true,
            pins: true,
            device: true,
            debug: true,
            build: true,
            ..Default::default()
        };
        assert_eq!(
            tokens(Operation::Info(params)),
            vec!["info", "-b", "-m", "-p", "-d", "--debug", "-l"]
        );
    }

    #[test]
    fn test_info_full_ordering() {
        let params = InfoParams {
            target: "firmware.uf2".into(),
            basic: false,
            pins: true,
            force: ForceOptions {
                force: true,
                force_no_reboot: false,
            },
            selector: full_selector(),
            ..Default::default()
        };
        assert_eq!(
            tokens(Operation::Info(params)),
            vec![
                "info",
                "-p",
                "firmware.uf2",
                "--bus",
                "1",
                "--address",
                "7",
                "--vid",
                "0x2e8a",
                "--pid",
                "0x0003",
                "--ser",
                "E66138",
                "-f",
            ]
        );
    }

    #[test]
    fn test_both_force_flags_yield_force() {
        let params = RebootParams {
            force: ForceOptions {
                force: true,
                force_no_reboot: true,
            },
            ..Default::default()
        };
        assert_eq!(tokens(Operation::Reboot(params)), vec!["reboot", "-f"]);
    }

    #[test]
    fn test_force_no_reboot_alone() {
        let params = PartitionInfoParams {
            force: ForceOptions {
                force: false,
                force_no_reboot: true,
            },
            ..Default::default()
        };
        assert_eq!(
            tokens(Operation::PartitionInfo(params)),
            vec!["partition", "info", "-F"]
        );
    }

    #[test]
    fn test_reboot_options() {
        let params = RebootParams {
            all_devices: true,
            usb_mass_storage: true,
            partition: Some("1".into()),
            cpu: Some("RISC-V".into()),
            selector: DeviceSelector {
                serial: Some("ABC".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            tokens(Operation::Reboot(params)),
            vec!["reboot", "-a", "-u", "-g", "1", "-c", "RISC-V", "--ser", "ABC"]
        );
    }

    #[test]
    fn test_partition_info_family_target() {
        let params = PartitionInfoParams {
            family_id: Some("rp2350-arm-s".into()),
            selector: DeviceSelector {
                bus: Some("3".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            tokens(Operation::PartitionInfo(params)),
            vec!["partition", "info", "rp2350-arm-s", "--bus", "3"]
        );
    }

    #[test]
    fn test_empty_target_is_omitted() {
        let params = PartitionInfoParams {
            family_id: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(
            tokens(Operation::PartitionInfo(params)),
            vec!["partition", "info"]
        );
    }

    #[test]
    fn test_erase_all() {
        let params = EraseParams {
            all_flash: true,
            force: ForceOptions {
                force: true,
                force_no_reboot: false,
            },
            ..Default::default()
        };
        assert_eq!(tokens(Operation::Erase(params)), vec!["erase", "-a", "-f"]);
    }

    #[test]
    fn test_erase_range() {
        let params = EraseParams {
            range_start: Some("0x10000000".into()),
            range_end: Some("0x10100000".into()),
            ..Default::default()
        };
        assert_eq!(
            tokens(Operation::Erase(params)),
            vec!["erase", "-r", "0x10000000", "0x10100000"]
        );
    }

    #[test]
    fn test_erase_half_range_is_ignored() {
        let params = EraseParams {
            range_start: Some("0x10000000".into()),
            ..Default::default()
        };
        assert_eq!(tokens(Operation::Erase(params)), vec!["erase"]);
    }

    #[test]
    fn test_erase_sector_becomes_single_sector_range() {
        let params = EraseParams {
            sector: Some("0x10001000".into()),
            ..Default::default()
        };
        assert_eq!(
            tokens(Operation::Erase(params)),
            vec!["erase", "-r", "0x10001000", "0x10001001"]
        );
    }

    #[test]
    fn test_erase_unparseable_sector_passes_through() {
        let params = EraseParams {
            sector: Some("bogus".into()),
            ..Default::default()
        };
        assert_eq!(
            tokens(Operation::Erase(params)),
            vec!["erase", "-r", "bogus", "bogus"]
        );
    }

    #[test]
    fn test_erase_modes_are_not_validated() {
        let params = EraseParams {
            all_flash: true,
            sector: Some("4096".into()),
            ..Default::default()
        };
        assert_eq!(
            tokens(Operation::Erase(params)),
            vec!["erase", "-a", "-r", "0x1000", "0x1001"]
        );
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x10"), Some(16));
        assert_eq!(parse_address("0X1f"), Some(31));
        assert_eq!(parse_address("42"), Some(42));
        assert_eq!(parse_address("0xzz"), None);
    }

    fn opt_value() -> impl Strategy<Value = Option<String>> {
        prop::option::of("[a-zA-Z0-9]{0,6}")
    }

    prop_compose! {
        fn arb_selector()(
            bus in opt_value(),
            address in opt_value(),
            vid in opt_value(),
            pid in opt_value(),
            serial in opt_value(),
        ) -> DeviceSelector {
            DeviceSelector { bus, address, vid, pid, serial }
        }
    }

    prop_compose! {
        fn arb_info()(
            target in "[a-z]{0,8}\\.uf2|",
            flags in prop::array::uniform7(any::<bool>()),
            force in any::<bool>(),
            force_no_reboot in any::<bool>(),
            selector in arb_selector(),
        ) -> InfoParams {
            InfoParams {
                target,
                basic: flags[0],
                metadata: flags[1],
                pins: flags[2],
                device: flags[3],
                debug: flags[4],
                build: flags[5],
                all: flags[6],
                force: ForceOptions { force, force_no_reboot },
                selector,
            }
        }
    }

    proptest! {
        #[test]
        fn prop_info_segments_render_in_order(params in arb_info()) {
            let inv = lower(&Operation::Info(params.clone()));
            let rendered = inv.clone().into_tokens();

            // target sits right after the options and before any selector flag
            let opts_end = 1 + inv.options.len();
            prop_assert_eq!(&rendered[0], "info");
            if params.target.is_empty() {
                prop_assert!(!rendered.contains(&params.target));
            } else {
                prop_assert_eq!(&rendered[opts_end], &params.target);
                prop_assert_eq!(rendered.iter().filter(|t| **t == params.target).count(), 1);
            }

            // force flag, if any, is last and unique
            let force_flags = rendered.iter().filter(|t| *t == "-f" || *t == "-F").count();
            prop_assert!(force_flags <= 1);
            if force_flags == 1 {
                let last = rendered.last().unwrap();
                prop_assert!(last == "-f" || last == "-F");
                if params.force.force {
                    prop_assert_eq!(last, "-f");
                }
            }
        }

        #[test]
        fn prop_all_suppresses_individual_flags(params in arb_info()) {
            let rendered = compose(&Operation::Info(params.clone()));
            if params.all {
                for flag in ["-b", "-m", "-p", "-d", "--debug", "-l"] {
                    prop_assert!(!rendered.iter().any(|t| t == flag));
                }
                prop_assert_eq!(&rendered[1], "-a");
            }
        }

        #[test]
        fn prop_selector_order_is_fixed(selector in arb_selector()) {
            let rendered = compose(&Operation::Reboot(RebootParams {
                selector,
                ..Default::default()
            }));
            let order = ["--bus", "--address", "--vid", "--pid", "--ser"];
            let positions: Vec<usize> = rendered
                .iter()
                .filter_map(|t| order.iter().position(|f| f == t))
                .collect();
            let mut sorted = positions.clone();
            sorted.sort_unstable();
            prop_assert_eq!(positions, sorted);
        }

        #[test]
        fn prop_compose_is_deterministic(params in arb_info()) {
            let op = Operation::Info(params);
            prop_assert_eq!(compose(&op), compose(&op));
        }
    }
}

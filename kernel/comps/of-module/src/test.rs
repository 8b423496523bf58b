// SPDX-License-Identifier: MPL-2.0

use alloc::{format, string::String, sync::Arc, vec::Vec};
use core::ffi::CStr;
use std::sync::Mutex;

use kernel_error::{Errno, Result};
use of_tree::{DeviceNode, DeviceTree, DeviceTreeBuilder, OfAliases};

use super::*;
use crate::add_uevent_var;

/// Builds a tree with a few nodes of different shapes:
///
/// - `/uart@1000`: no type, a compatible string with a space;
/// - `/soc/serial@40060000`: typed, two compatible strings;
/// - `/bare`: neither type nor compatible strings.
fn build_tree() -> Arc<DeviceTree> {
    let mut builder = DeviceTreeBuilder::new();
    let root = builder.root();

    let uart = builder.add_node(root, "uart@1000");
    builder.set_str_list(uart, "compatible", &["vendor,uart-a", "vendor,uart b"]);

    let soc = builder.add_node(root, "soc");
    let serial = builder.add_node(soc, "serial@40060000");
    builder
        .set_str(serial, "device_type", "serial")
        .set_str_list(serial, "compatible", &["renesas,r9a06g032-uart", "ns16550a"]);

    builder.add_node(root, "bare");

    builder.build()
}

fn node(tree: &Arc<DeviceTree>, path: &str) -> DeviceNode {
    tree.find_node_by_path(path).unwrap()
}

#[test]
fn modalias_format() {
    let tree = build_tree();

    assert_eq!(
        modalias(&node(&tree, "/uart@1000")),
        "of:NuartTCvendor,uart-aCvendor,uart_b"
    );
    assert_eq!(
        modalias(&node(&tree, "/soc/serial@40060000")),
        "of:NserialTserialCrenesas,r9a06g032-uartCns16550a"
    );
    assert_eq!(modalias(&node(&tree, "/bare")), "of:NbareT");
}

#[test]
fn spaces_become_underscores() {
    let mut builder = DeviceTreeBuilder::new();
    let root = builder.root();
    let dev = builder.add_node(root, "dev");
    builder.set_str_list(dev, "compatible", &["a b  c", " x "]);
    let tree = builder.build();

    let alias = modalias(&node(&tree, "/dev"));
    assert_eq!(alias, "of:NdevTCa_b__cC_x_");
    assert!(!alias.contains(' '));
}

#[test]
fn measure_then_fill() {
    let tree = build_tree();

    for path in ["/uart@1000", "/soc/serial@40060000", "/bare"] {
        let node = node(&tree, path);
        let size = modalias_into(&node, &mut []);
        assert_eq!(size, modalias_len(&node));

        let mut buf = alloc::vec![0u8; size];
        assert_eq!(modalias_into(&node, &mut buf), size);
        assert_eq!(core::str::from_utf8(&buf).unwrap(), modalias(&node));
    }
}

#[test]
fn oversized_compatible_is_skipped_but_counted() {
    let mut builder = DeviceTreeBuilder::new();
    let root = builder.root();
    let dev = builder.add_node(root, "dev");
    builder.set_str_list(dev, "compatible", &["vendor,long-compatible", "ns"]);
    let tree = builder.build();
    let dev = node(&tree, "/dev");

    let full = modalias(&dev);
    // Room for the prefix (`of:NdevT`) and `Cns`, but not for the first entry.
    let mut buf = [0u8; 11];
    let size = modalias_into(&dev, &mut buf);
    assert_eq!(size, full.len());
    assert_eq!(&buf, b"of:NdevTCns");
}

#[test]
fn non_utf8_compatible_entries_are_kept() {
    let mut builder = DeviceTreeBuilder::new();
    let root = builder.root();
    let dev = builder.add_node(root, "dev");
    builder.set_property(dev, "compatible", b"vendor,a\0vendor,\xffb\0vendor,c\0".to_vec());
    let tree = builder.build();
    let dev = node(&tree, "/dev");

    let mut alias = alloc::vec![0u8; modalias_len(&dev)];
    modalias_into(&dev, &mut alias);
    assert_eq!(alias, b"of:NdevTCvendor,aCvendor,\xffbCvendor,c");
    assert_eq!(alias.iter().filter(|&&byte| byte == b'C').count(), 3);
    assert_eq!(modalias(&dev), "of:NdevTCvendor,aCvendor,\u{fffd}bCvendor,c");

    let loader = RecordingLoader::default();
    request_module(Some(&dev), &loader).unwrap();
    assert_eq!(*loader.requests.lock().unwrap(), [modalias(&dev)]);

    let mut env = UeventEnv::new();
    uevent(Some(&dev), &mut env, &OfAliases::new()).unwrap();
    assert_eq!(env.get("OF_COMPATIBLE_N"), Some("3"));
    assert_eq!(env.get("OF_COMPATIBLE_0"), Some("vendor,a"));
    assert_eq!(env.get_raw("OF_COMPATIBLE_1"), Some(&b"vendor,\xffb"[..]));
    assert_eq!(env.get("OF_COMPATIBLE_1"), None);
    assert_eq!(env.get("OF_COMPATIBLE_2"), Some("vendor,c"));
    assert_eq!(env.raw_vars().count(), 6);

    uevent_modalias(Some(&dev), &mut env).unwrap();
    assert_eq!(env.get_raw("MODALIAS"), Some(alias.as_slice()));
}

#[test]
fn truncated_prefix_skips_all_compatibles() {
    let tree = build_tree();
    let uart = node(&tree, "/uart@1000");

    let mut buf = [0u8; 6];
    let size = modalias_into(&uart, &mut buf);
    assert_eq!(size, modalias(&uart).len());
    assert_eq!(&buf, b"of:Nua");
}

#[test]
fn printable_modalias_line() {
    let tree = build_tree();
    let uart = node(&tree, "/uart@1000");
    let size = modalias_len(&uart);

    let mut buf = alloc::vec![0xffu8; size + 2];
    assert_eq!(printable_modalias(Some(&uart), &mut buf), Ok(size + 1));
    assert_eq!(&buf[..size], modalias(&uart).as_bytes());
    assert_eq!(&buf[size..], b"\n\0");

    let mut short = alloc::vec![0u8; size + 1];
    assert_eq!(
        printable_modalias(Some(&uart), &mut short).unwrap_err().error(),
        Errno::ENOMEM
    );
    assert_eq!(
        printable_modalias(Some(&uart), &mut [0u8; 1]).unwrap_err().error(),
        Errno::ENOMEM
    );
    assert_eq!(
        printable_modalias(None, &mut buf).unwrap_err().error(),
        Errno::ENODEV
    );
}

#[derive(Default)]
struct RecordingLoader {
    requests: Mutex<Vec<String>>,
    result: Option<Errno>,
}

impl ModuleLoader for RecordingLoader {
    fn request_module(&self, name: &CStr) -> Result<()> {
        self.requests
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(name.to_bytes()).into_owned());
        match self.result {
            Some(errno) => Err(errno.into()),
            None => Ok(()),
        }
    }
}

#[test]
fn request_module_passes_modalias() {
    let tree = build_tree();
    let serial = node(&tree, "/soc/serial@40060000");
    let loader = RecordingLoader::default();

    request_module(Some(&serial), &loader).unwrap();
    assert_eq!(
        *loader.requests.lock().unwrap(),
        ["of:NserialTserialCrenesas,r9a06g032-uartCns16550a"]
    );
}

#[test]
fn request_module_propagates_loader_result() {
    let tree = build_tree();
    let bare = node(&tree, "/bare");
    let loader = RecordingLoader {
        result: Some(Errno::ENOENT),
        ..Default::default()
    };

    assert_eq!(
        request_module(Some(&bare), &loader).unwrap_err().error(),
        Errno::ENOENT
    );
    assert_eq!(*loader.requests.lock().unwrap(), ["of:NbareT"]);

    assert_eq!(
        request_module(None, &loader).unwrap_err().error(),
        Errno::ENODEV
    );
    assert_eq!(loader.requests.lock().unwrap().len(), 1);
}

#[test]
fn uevent_variables() {
    let tree = build_tree();
    let serial = node(&tree, "/soc/serial@40060000");
    let aliases = OfAliases::new();
    aliases.add("serial0", serial.clone()).unwrap();
    aliases.add("console2", serial.clone()).unwrap();
    aliases.add("serial1", node(&tree, "/uart@1000")).unwrap();

    let mut env = UeventEnv::new();
    uevent(Some(&serial), &mut env, &aliases).unwrap();

    let vars: Vec<&str> = env.vars().collect();
    assert_eq!(
        vars,
        [
            "OF_NAME=serial",
            "OF_FULLNAME=/soc/serial@40060000",
            "OF_TYPE=serial",
            "OF_COMPATIBLE_0=renesas,r9a06g032-uart",
            "OF_COMPATIBLE_1=ns16550a",
            "OF_COMPATIBLE_N=2",
            "OF_ALIAS_0=serial0",
            "OF_ALIAS_1=console2",
        ]
    );
    assert_eq!(env.get("OF_COMPATIBLE_N"), Some("2"));
}

#[test]
fn uevent_without_type_or_compatible() {
    let tree = build_tree();
    let mut env = UeventEnv::new();
    uevent(Some(&node(&tree, "/bare")), &mut env, &OfAliases::new()).unwrap();

    let vars: Vec<&str> = env.vars().collect();
    assert_eq!(
        vars,
        ["OF_NAME=bare", "OF_FULLNAME=/bare", "OF_COMPATIBLE_N=0"]
    );
    assert_eq!(env.get("OF_TYPE"), None);

    let mut env = UeventEnv::new();
    uevent(Some(&tree.root()), &mut env, &OfAliases::new()).unwrap();
    assert_eq!(env.get("OF_FULLNAME"), Some("/"));
}

#[test]
fn uevent_without_node() {
    let mut env = UeventEnv::new();
    assert_eq!(
        uevent(None, &mut env, &OfAliases::new()).unwrap_err().error(),
        Errno::ENODEV
    );
    assert_eq!(
        uevent_modalias(None, &mut env).unwrap_err().error(),
        Errno::ENODEV
    );
    assert!(env.is_empty());
}

#[test]
fn uevent_runs_out_of_variables() {
    let names: Vec<String> = (0..UEVENT_NUM_ENVP).map(|i| format!("vendor,dev{}", i)).collect();
    let compatible: Vec<&str> = names.iter().map(String::as_str).collect();

    let mut builder = DeviceTreeBuilder::new();
    let root = builder.root();
    let dev = builder.add_node(root, "dev");
    builder.set_str_list(dev, "compatible", &compatible);
    let tree = builder.build();

    let mut env = UeventEnv::new();
    let err = uevent(Some(&node(&tree, "/dev")), &mut env, &OfAliases::new()).unwrap_err();
    assert_eq!(err.error(), Errno::ENOMEM);
    assert_eq!(env.len(), UEVENT_NUM_ENVP);
}

#[test]
fn uevent_runs_out_of_buffer() {
    let long = "x".repeat(UEVENT_BUFFER_SIZE);
    let mut env = UeventEnv::new();
    assert_eq!(
        add_uevent_var!(env, "PAD={}", long).unwrap_err().error(),
        Errno::ENOMEM
    );
    assert!(env.is_empty());
    assert_eq!(env.buflen(), 0);

    // `KEY=` plus the terminator fill the buffer exactly.
    let exact = "x".repeat(UEVENT_BUFFER_SIZE - 5);
    add_uevent_var!(env, "PAD={}", exact).unwrap();
    assert_eq!(env.buflen(), UEVENT_BUFFER_SIZE);
    assert_eq!(
        add_uevent_var!(env, "A=").unwrap_err().error(),
        Errno::ENOMEM
    );
}

#[test]
fn modalias_variable() {
    let tree = build_tree();
    let serial = node(&tree, "/soc/serial@40060000");

    let mut env = UeventEnv::new();
    add_uevent_var!(env, "DRIVER={}", "rzn1-uart").unwrap();
    uevent_modalias(Some(&serial), &mut env).unwrap();
    add_uevent_var!(env, "SEQNUM={}", 7).unwrap();

    let expected = modalias(&serial);
    assert_eq!(env.get("MODALIAS"), Some(expected.as_str()));
    assert_eq!(env.get("DRIVER"), Some("rzn1-uart"));
    assert_eq!(env.get("SEQNUM"), Some("7"));
    assert_eq!(
        env.buflen(),
        "DRIVER=rzn1-uart".len() + 1 + "MODALIAS=".len() + expected.len() + 1 + "SEQNUM=7".len() + 1
    );
}

#[test]
fn modalias_variable_does_not_fit() {
    let tree = build_tree();
    let serial = node(&tree, "/soc/serial@40060000");
    let alias_len = modalias_len(&serial);

    let mut env = UeventEnv::new();
    // Leave room for `MODALIAS=` and a few bytes less than the alias needs.
    let pad = UEVENT_BUFFER_SIZE - "PAD=".len() - 1 - "MODALIAS=".len() - 1 - alias_len + 4;
    add_uevent_var!(env, "PAD={}", "x".repeat(pad)).unwrap();
    let buflen = env.buflen();

    assert_eq!(
        uevent_modalias(Some(&serial), &mut env).unwrap_err().error(),
        Errno::ENOMEM
    );
    assert_eq!(env.get("MODALIAS"), Some(""));
    assert_eq!(env.buflen(), buflen + "MODALIAS=".len() + 1);
}

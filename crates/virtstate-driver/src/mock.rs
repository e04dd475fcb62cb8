//! In-memory mock driver for tests and dry runs.

use crate::driver::HypervisorDriver;
use crate::error::{DriverError, Result, ERR_DOMAIN_EXISTS};
use crate::types::{NodeInfo, RawVmInfo};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// A fake VM held by [`MockDriver`].
#[derive(Debug, Clone)]
pub struct MockVm {
    /// Hypervisor-native state code
    pub state_code: u32,
    /// Persisted definition XML
    pub inactive_xml: String,
    /// Host-autostart flag
    pub autostart: bool,
}

impl MockVm {
    fn new(name: &str, state_code: u32) -> Self {
        Self {
            state_code,
            inactive_xml: format!("<domain type='test'><name>{}</name></domain>", name),
            autostart: false,
        }
    }
}

/// Hypervisor driver backed by an in-memory domain table.
///
/// Every trait call is appended to a call log (`"resume alpha"`,
/// `"define_xml"`, ...) so tests can assert exactly which primitives the
/// reconciliation core issued. Mutating calls update the table the way a
/// cooperative hypervisor would: `shutdown` and `destroy` move the VM to
/// shut off, `define_xml` registers or overrides a definition, `undefine`
/// removes it.
#[derive(Debug, Default)]
pub struct MockDriver {
    vms: Mutex<HashMap<String, MockVm>>,
    calls: Mutex<Vec<String>>,
    failing_status: Mutex<HashSet<String>>,
    reject_redefine: bool,
}

impl MockDriver {
    /// Create an empty mock with no VMs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a VM with the given raw state code.
    pub fn with_vm(self, name: &str, state_code: u32) -> Self {
        self.vms
            .lock()
            .unwrap()
            .insert(name.to_string(), MockVm::new(name, state_code));
        self
    }

    /// Add a VM with an explicit persisted definition XML.
    pub fn with_vm_xml(self, name: &str, state_code: u32, xml: &str) -> Self {
        let mut vm = MockVm::new(name, state_code);
        vm.inactive_xml = xml.to_string();
        self.vms.lock().unwrap().insert(name.to_string(), vm);
        self
    }

    /// Add a VM with the host-autostart flag set.
    pub fn with_autostart_vm(self, name: &str, state_code: u32, autostart: bool) -> Self {
        let mut vm = MockVm::new(name, state_code);
        vm.autostart = autostart;
        self.vms.lock().unwrap().insert(name.to_string(), vm);
        self
    }

    /// Make `state_code` and `vm_info` fail for the given name, simulating
    /// a VM that disappears between enumeration and status query.
    pub fn with_failing_status(self, name: &str) -> Self {
        self.failing_status.lock().unwrap().insert(name.to_string());
        self
    }

    /// Make `define_xml` fail with the "domain already exists" API code
    /// instead of overriding an existing definition.
    pub fn rejecting_redefine(mut self) -> Self {
        self.reject_redefine = true;
        self
    }

    /// The log of driver calls issued so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of logged calls starting with the given operation token.
    pub fn call_count(&self, op: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.split_whitespace().next() == Some(op))
            .count()
    }

    /// Snapshot of the named VM, if defined.
    pub fn vm(&self, name: &str) -> Option<MockVm> {
        self.vms.lock().unwrap().get(name).cloned()
    }

    fn log(&self, entry: String) {
        tracing::trace!(call = %entry, "mock driver call");
        self.calls.lock().unwrap().push(entry);
    }

    fn with_existing<T>(&self, name: &str, f: impl FnOnce(&mut MockVm) -> T) -> Result<T> {
        let mut vms = self.vms.lock().unwrap();
        match vms.get_mut(name) {
            Some(vm) => Ok(f(vm)),
            None => Err(DriverError::VmNotFound(name.to_string())),
        }
    }
}

#[async_trait]
impl HypervisorDriver for MockDriver {
    async fn list_names(&self) -> Result<Vec<String>> {
        self.log("list_names".to_string());
        let mut names: Vec<String> = self.vms.lock().unwrap().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn state_code(&self, name: &str) -> Result<u32> {
        self.log(format!("state_code {}", name));
        if self.failing_status.lock().unwrap().contains(name) {
            return Err(DriverError::Api {
                code: 1,
                message: format!("status query failed for {}", name),
            });
        }
        self.with_existing(name, |vm| vm.state_code)
    }

    async fn vm_info(&self, name: &str) -> Result<RawVmInfo> {
        self.log(format!("vm_info {}", name));
        if self.failing_status.lock().unwrap().contains(name) {
            return Err(DriverError::Api {
                code: 1,
                message: format!("info query failed for {}", name),
            });
        }
        self.with_existing(name, |vm| RawVmInfo {
            state_code: vm.state_code,
            max_mem: 1_048_576,
            memory: 524_288,
            vcpus: 2,
            cpu_time: 1_000_000,
        })
    }

    async fn start(&self, name: &str) -> Result<()> {
        self.log(format!("start {}", name));
        self.with_existing(name, |vm| vm.state_code = 1)
    }

    async fn destroy(&self, name: &str) -> Result<()> {
        self.log(format!("destroy {}", name));
        self.with_existing(name, |vm| vm.state_code = 5)
    }

    async fn shutdown(&self, name: &str) -> Result<()> {
        self.log(format!("shutdown {}", name));
        self.with_existing(name, |vm| vm.state_code = 5)
    }

    async fn suspend(&self, name: &str) -> Result<()> {
        self.log(format!("suspend {}", name));
        self.with_existing(name, |vm| vm.state_code = 3)
    }

    async fn resume(&self, name: &str) -> Result<()> {
        self.log(format!("resume {}", name));
        self.with_existing(name, |vm| vm.state_code = 1)
    }

    async fn undefine(&self, name: &str, mask: u32) -> Result<()> {
        self.log(format!("undefine {} {}", name, mask));
        let mut vms = self.vms.lock().unwrap();
        match vms.remove(name) {
            Some(_) => Ok(()),
            None => Err(DriverError::VmNotFound(name.to_string())),
        }
    }

    async fn define_xml(&self, xml: &str) -> Result<()> {
        self.log("define_xml".to_string());
        let name = mock_name_from_xml(xml).ok_or(DriverError::Api {
            code: 27,
            message: "missing domain name".to_string(),
        })?;
        let mut vms = self.vms.lock().unwrap();
        if let Some(existing) = vms.get_mut(&name) {
            if self.reject_redefine {
                return Err(DriverError::Api {
                    code: ERR_DOMAIN_EXISTS,
                    message: format!("domain '{}' already exists", name),
                });
            }
            existing.inactive_xml = xml.to_string();
        } else {
            let mut vm = MockVm::new(&name, 5);
            vm.inactive_xml = xml.to_string();
            vms.insert(name, vm);
        }
        Ok(())
    }

    async fn inactive_xml(&self, name: &str) -> Result<String> {
        self.log(format!("inactive_xml {}", name));
        self.with_existing(name, |vm| vm.inactive_xml.clone())
    }

    async fn active_xml(&self, name: &str) -> Result<String> {
        self.log(format!("active_xml {}", name));
        self.with_existing(name, |vm| vm.inactive_xml.clone())
    }

    async fn autostart(&self, name: &str) -> Result<bool> {
        self.log(format!("autostart {}", name));
        self.with_existing(name, |vm| vm.autostart)
    }

    async fn set_autostart(&self, name: &str, enabled: bool) -> Result<()> {
        self.log(format!("set_autostart {} {}", name, enabled));
        self.with_existing(name, |vm| vm.autostart = enabled)
    }

    async fn free_memory(&self) -> Result<u64> {
        self.log("free_memory".to_string());
        Ok(8 * 1024 * 1024 * 1024)
    }

    async fn node_info(&self) -> Result<NodeInfo> {
        self.log("node_info".to_string());
        Ok(NodeInfo {
            cpu_model: "x86_64".to_string(),
            memory_mib: 16384,
            cpus: 8,
            mhz: 2400,
            numa_nodes: 1,
            sockets: 1,
            cores: 4,
            threads: 2,
        })
    }

    async fn hypervisor_type(&self) -> Result<String> {
        self.log("hypervisor_type".to_string());
        Ok("TEST".to_string())
    }
}

/// Minimal `<name>` element scan so the mock can register definitions the
/// way a real hypervisor keys them.
fn mock_name_from_xml(xml: &str) -> Option<String> {
    let start = xml.find("<name>")? + "<name>".len();
    let end = xml[start..].find("</name>")? + start;
    let name = xml[start..end].trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

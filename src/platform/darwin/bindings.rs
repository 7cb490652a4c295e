//! Raw mach, IOKit and routing-socket declarations used by the macOS probe.
//!
//! Only what libc does not already provide is declared here.

#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_int, c_void};

//------------------------------------------------------------------------------
// Mach host statistics
//------------------------------------------------------------------------------

pub type kern_return_t = c_int;
pub type mach_port_t = u32;
pub type natural_t = u32;
pub type integer_t = i32;

pub const KERN_SUCCESS: kern_return_t = 0;

pub const PROCESSOR_CPU_LOAD_INFO: c_int = 2;
pub const CPU_STATE_MAX: usize = 4;
pub const CPU_STATE_USER: usize = 0;
pub const CPU_STATE_SYSTEM: usize = 1;
pub const CPU_STATE_IDLE: usize = 2;
pub const CPU_STATE_NICE: usize = 3;

pub const HOST_VM_INFO64: c_int = 4;
pub const HOST_VM_INFO64_COUNT: u32 = (std::mem::size_of::<vm_statistics64>() / std::mem::size_of::<integer_t>()) as u32;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct vm_statistics64 {
    pub free_count: natural_t,
    pub active_count: natural_t,
    pub inactive_count: natural_t,
    pub wire_count: natural_t,
    pub zero_fill_count: u64,
    pub reactivations: u64,
    pub pageins: u64,
    pub pageouts: u64,
    pub faults: u64,
    pub cow_faults: u64,
    pub lookups: u64,
    pub hits: u64,
    pub purges: u64,
    pub purgeable_count: natural_t,
    pub speculative_count: natural_t,
    pub decompressions: u64,
    pub compressions: u64,
    pub swapins: u64,
    pub swapouts: u64,
    pub compressor_page_count: natural_t,
    pub throttled_count: natural_t,
    pub external_page_count: natural_t,
    pub internal_page_count: natural_t,
    pub total_uncompressed_pages_in_compressor: u64,
}

/// `vm.swapusage`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct xsw_usage {
    pub xsu_total: u64,
    pub xsu_avail: u64,
    pub xsu_used: u64,
    pub xsu_pagesize: u32,
    pub xsu_encrypted: u32,
}

extern "C" {
    pub static mach_task_self_: mach_port_t;

    pub fn mach_host_self() -> mach_port_t;

    pub fn host_processor_info(
        host: mach_port_t,
        flavor: c_int,
        out_processor_count: *mut natural_t,
        out_processor_info: *mut *mut integer_t,
        out_processor_info_count: *mut u32,
    ) -> kern_return_t;

    pub fn host_statistics64(
        host_priv: mach_port_t,
        flavor: c_int,
        host_info_out: *mut integer_t,
        host_info_out_count: *mut u32,
    ) -> kern_return_t;

    pub fn vm_deallocate(target_task: mach_port_t, address: usize, size: usize) -> kern_return_t;
}

pub fn mach_task_self() -> mach_port_t {
    // SAFETY: set once by the kernel at process start and never written again
    unsafe { mach_task_self_ }
}

//------------------------------------------------------------------------------
// Routing socket interface statistics (NET_RT_IFLIST2)
//------------------------------------------------------------------------------

pub const NET_RT_IFLIST2: c_int = 6;
pub const RTM_IFINFO2: u8 = 0x12;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct timeval32 {
    pub tv_sec: i32,
    pub tv_usec: i32,
}

/// 64-bit interface counters
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct if_data64 {
    pub ifi_type: u8,
    pub ifi_typelen: u8,
    pub ifi_physical: u8,
    pub ifi_addrlen: u8,
    pub ifi_hdrlen: u8,
    pub ifi_recvquota: u8,
    pub ifi_xmitquota: u8,
    pub ifi_unused1: u8,
    pub ifi_mtu: u32,
    pub ifi_metric: u32,
    pub ifi_baudrate: u64,
    pub ifi_ipackets: u64,
    pub ifi_ierrors: u64,
    pub ifi_opackets: u64,
    pub ifi_oerrors: u64,
    pub ifi_collisions: u64,
    pub ifi_ibytes: u64,
    pub ifi_obytes: u64,
    pub ifi_imcasts: u64,
    pub ifi_omcasts: u64,
    pub ifi_iqdrops: u64,
    pub ifi_noproto: u64,
    pub ifi_recvtiming: u32,
    pub ifi_xmittiming: u32,
    pub ifi_lastchange: timeval32,
}

/// Common header of every routing message
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct if_msghdr {
    pub ifm_msglen: u16,
    pub ifm_version: u8,
    pub ifm_type: u8,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct if_msghdr2 {
    pub ifm_msglen: u16,
    pub ifm_version: u8,
    pub ifm_type: u8,
    pub ifm_addrs: c_int,
    pub ifm_flags: c_int,
    pub ifm_index: u16,
    pub ifm_snd_len: c_int,
    pub ifm_snd_maxlen: c_int,
    pub ifm_snd_drops: c_int,
    pub ifm_timer: c_int,
    pub ifm_data: if_data64,
}

//------------------------------------------------------------------------------
// IOKit / SMC
//------------------------------------------------------------------------------

pub type io_object_t = mach_port_t;
pub type io_connect_t = mach_port_t;

pub const K_IO_MASTER_PORT_DEFAULT: mach_port_t = 0;
pub const K_IO_RETURN_SUCCESS: kern_return_t = 0;
pub const K_IO_RETURN_NOT_PRIVILEGED: kern_return_t = 0xe000_02c1_u32 as kern_return_t;

pub const KERNEL_INDEX_SMC: u32 = 2;
pub const SMC_CMD_READ_BYTES: u8 = 5;
pub const SMC_CMD_READ_KEYINFO: u8 = 9;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SmcVersion {
    pub major: u8,
    pub minor: u8,
    pub build: u8,
    pub reserved: u8,
    pub release: u16,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SmcPLimitData {
    pub version: u16,
    pub length: u16,
    pub cpu_p_limit: u32,
    pub gpu_p_limit: u32,
    pub mem_p_limit: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SmcKeyInfo {
    pub data_size: u32,
    pub data_type: u32,
    pub data_attributes: u8,
}

/// The 80-byte structure exchanged with the AppleSMC user client
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SmcKeyData {
    pub key: u32,
    pub vers: SmcVersion,
    pub p_limit_data: SmcPLimitData,
    pub key_info: SmcKeyInfo,
    pub result: u8,
    pub status: u8,
    pub data8: u8,
    pub data32: u32,
    pub bytes: [u8; 32],
}

#[link(name = "IOKit", kind = "framework")]
extern "C" {
    pub fn IOServiceMatching(name: *const c_char) -> *mut c_void;
    pub fn IOServiceGetMatchingService(main_port: mach_port_t, matching: *mut c_void) -> io_object_t;
    pub fn IOServiceOpen(
        service: io_object_t,
        owning_task: mach_port_t,
        connection_type: u32,
        connection: *mut io_connect_t,
    ) -> kern_return_t;
    pub fn IOServiceClose(connection: io_connect_t) -> kern_return_t;
    pub fn IOObjectRelease(object: io_object_t) -> kern_return_t;
    pub fn IOConnectCallStructMethod(
        connection: io_connect_t,
        selector: u32,
        input: *const c_void,
        input_size: usize,
        output: *mut c_void,
        output_size: *mut usize,
    ) -> kern_return_t;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_layouts_match_the_kernel() {
        assert_eq!(std::mem::size_of::<SmcKeyData>(), 80);
        assert_eq!(std::mem::size_of::<if_data64>(), 128);
        assert_eq!(std::mem::size_of::<vm_statistics64>(), 152);
        assert_eq!(HOST_VM_INFO64_COUNT, 38);
    }
}

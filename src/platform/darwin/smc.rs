use std::{mem, os::raw::c_void};

use scopeguard::defer;

use super::bindings::{
    mach_task_self, IOConnectCallStructMethod, IOObjectRelease, IOServiceClose, IOServiceGetMatchingService,
    IOServiceMatching, IOServiceOpen, SmcKeyData, K_IO_MASTER_PORT_DEFAULT, K_IO_RETURN_NOT_PRIVILEGED,
    K_IO_RETURN_SUCCESS, KERNEL_INDEX_SMC, SMC_CMD_READ_BYTES, SMC_CMD_READ_KEYINFO,
};
use crate::{
    error::{Error, Result},
    platform::smc::{decode, four_char_code},
};

/// An open connection to the AppleSMC user client
#[derive(Debug)]
pub struct SmcConnection {
    connection: u32,
}

impl SmcConnection {
    pub fn open() -> Result<Self> {
        // SAFETY: IOServiceMatching copies the NUL-terminated name; the
        // matching dictionary is consumed by IOServiceGetMatchingService
        let service = unsafe {
            let matching = IOServiceMatching(b"AppleSMC\0".as_ptr().cast());
            if matching.is_null() {
                return Err(Error::system("IOServiceMatching(AppleSMC) returned null"));
            }
            IOServiceGetMatchingService(K_IO_MASTER_PORT_DEFAULT, matching)
        };
        if service == 0 {
            return Err(Error::unavailable("AppleSMC service not found"));
        }
        defer! {
            // SAFETY: `service` is a valid object returned above
            unsafe { IOObjectRelease(service); }
        }

        let mut connection = 0;
        // SAFETY: `connection` outlives the call
        let kr = unsafe { IOServiceOpen(service, mach_task_self(), 0, &mut connection) };
        match kr {
            K_IO_RETURN_SUCCESS => Ok(Self { connection }),
            K_IO_RETURN_NOT_PRIVILEGED => Err(Error::permission_denied("not allowed to open AppleSMC")),
            _ => Err(Error::system(format!("IOServiceOpen(AppleSMC) failed: {:#x}", kr))),
        }
    }

    fn call(&self, input: &SmcKeyData) -> Result<SmcKeyData> {
        let mut output = SmcKeyData::default();
        let mut output_size = mem::size_of::<SmcKeyData>();
        // SAFETY: both buffers are SmcKeyData sized and live across the call
        let kr = unsafe {
            IOConnectCallStructMethod(
                self.connection,
                KERNEL_INDEX_SMC,
                (input as *const SmcKeyData).cast::<c_void>(),
                mem::size_of::<SmcKeyData>(),
                (&mut output as *mut SmcKeyData).cast::<c_void>(),
                &mut output_size,
            )
        };
        if kr != K_IO_RETURN_SUCCESS {
            return Err(Error::system(format!("SMC call failed: {:#x}", kr)));
        }
        if output.result != 0 {
            return Err(Error::invalid_data(format!("SMC returned result code {}", output.result)));
        }
        Ok(output)
    }

    /// Reads and decodes a numeric key
    pub fn read(&self, key: &str) -> Result<f64> {
        let code = four_char_code(key).ok_or_else(|| Error::invalid_config(format!("bad SMC key {:?}", key)))?;

        let mut input = SmcKeyData { key: code, data8: SMC_CMD_READ_KEYINFO, ..Default::default() };
        let info = self.call(&input)?.key_info;

        input.key_info.data_size = info.data_size;
        input.data8 = SMC_CMD_READ_BYTES;
        let output = self.call(&input)?;

        let len = (info.data_size as usize).min(output.bytes.len());
        decode(info.data_type, &output.bytes[..len])
            .ok_or_else(|| Error::invalid_data(format!("SMC key {} has non-numeric type", key)))
    }
}

impl Drop for SmcConnection {
    fn drop(&mut self) {
        // SAFETY: the connection was opened by `open` and is closed once
        unsafe {
            IOServiceClose(self.connection);
        }
    }
}

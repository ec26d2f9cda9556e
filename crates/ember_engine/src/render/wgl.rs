//! WGL context back end
//!
//! Phase A attaches a legacy `wglCreateContext` context to the probe
//! window's device context purely to resolve entry points;
//! `wglGetProcAddress` only works with a current context, and even then
//! only for extension functions, so resolution falls back to
//! `opengl32.dll` exports for the core 1.1 symbols. Phase B re-selects
//! the pixel format through `wglChoosePixelFormatARB` on the real
//! window's DC and creates the attributed core-profile context.

use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_void};
use std::{mem, ptr};

use winapi::shared::minwindef::{BOOL, HMODULE, UINT, WORD};
use winapi::shared::windef::{HDC, HGLRC};
use winapi::um::libloaderapi::{FreeLibrary, GetProcAddress, LoadLibraryA};
use winapi::um::wingdi::{
    wglCreateContext, wglDeleteContext, wglGetProcAddress, wglMakeCurrent, ChoosePixelFormat,
    DescribePixelFormat, SetPixelFormat, SwapBuffers, PFD_DOUBLEBUFFER, PFD_DRAW_TO_WINDOW,
    PFD_SUPPORT_OPENGL, PFD_TYPE_RGBA, PIXELFORMATDESCRIPTOR,
};

use super::RendererError;
use crate::debug::leak_ledger::{LeakLedger, ResourceKind};
use crate::platform::win32::Win32Platform;

// WGL_ARB_create_context / WGL_ARB_pixel_format tokens (wglext.h).
const WGL_CONTEXT_MAJOR_VERSION_ARB: c_int = 0x2091;
const WGL_CONTEXT_MINOR_VERSION_ARB: c_int = 0x2092;
const WGL_CONTEXT_FLAGS_ARB: c_int = 0x2094;
const WGL_CONTEXT_PROFILE_MASK_ARB: c_int = 0x9126;
const WGL_CONTEXT_DEBUG_BIT_ARB: c_int = 0x0001;
const WGL_CONTEXT_CORE_PROFILE_BIT_ARB: c_int = 0x0001;
const WGL_DRAW_TO_WINDOW_ARB: c_int = 0x2001;
const WGL_ACCELERATION_ARB: c_int = 0x2003;
const WGL_SWAP_METHOD_ARB: c_int = 0x2007;
const WGL_SUPPORT_OPENGL_ARB: c_int = 0x2010;
const WGL_DOUBLE_BUFFER_ARB: c_int = 0x2011;
const WGL_PIXEL_TYPE_ARB: c_int = 0x2013;
const WGL_COLOR_BITS_ARB: c_int = 0x2014;
const WGL_ALPHA_BITS_ARB: c_int = 0x201B;
const WGL_DEPTH_BITS_ARB: c_int = 0x2022;
const WGL_FULL_ACCELERATION_ARB: c_int = 0x2027;
const WGL_SWAP_COPY_ARB: c_int = 0x2029;
const WGL_TYPE_RGBA_ARB: c_int = 0x202B;

type WglCreateContextAttribsArbFn =
    unsafe extern "system" fn(HDC, HGLRC, *const c_int) -> HGLRC;
type WglChoosePixelFormatArbFn = unsafe extern "system" fn(
    HDC,
    *const c_int,
    *const f32,
    UINT,
    *mut c_int,
    *mut UINT,
) -> BOOL;

/// WGL implementation of the context back end.
pub struct WglBackend {
    opengl_module: HMODULE,
    create_context_attribs: WglCreateContextAttribsArbFn,
    choose_pixel_format: WglChoosePixelFormatArbFn,
    hdc: HDC,
    hglrc: HGLRC,
}

fn get_proc_address(module: HMODULE, symbol: &str) -> *const c_void {
    let name = CString::new(symbol).unwrap();
    unsafe {
        let address = wglGetProcAddress(name.as_ptr());
        // Some drivers return small sentinel values instead of null.
        match address as isize {
            0 | 1 | 2 | 3 | -1 => GetProcAddress(module, name.as_ptr()) as *const c_void,
            _ => address as *const c_void,
        }
    }
}

unsafe fn resolve_extension(
    module: HMODULE,
    name: &'static str,
) -> Result<*const c_void, RendererError> {
    let address = get_proc_address(module, name);
    if address.is_null() {
        log::error!("failed to resolve extension entry point: {}", name);
        return Err(RendererError::MissingEntryPoints(name.to_string()));
    }
    Ok(address)
}

impl WglBackend {
    /// Phase A against the probe window's device context.
    pub(crate) fn probe(
        platform: &Win32Platform,
        ledger: &LeakLedger,
    ) -> Result<Self, RendererError> {
        let hdc = platform.hdc();

        unsafe {
            let mut pfd: PIXELFORMATDESCRIPTOR = mem::zeroed();
            pfd.nSize = mem::size_of::<PIXELFORMATDESCRIPTOR>() as WORD;
            pfd.nVersion = 1;
            pfd.dwFlags = PFD_DRAW_TO_WINDOW | PFD_SUPPORT_OPENGL | PFD_DOUBLEBUFFER;
            pfd.iPixelType = PFD_TYPE_RGBA as u8;
            pfd.cColorBits = 32;
            pfd.cDepthBits = 24;
            pfd.cStencilBits = 8;

            let format = ChoosePixelFormat(hdc, &pfd);
            if format == 0 {
                return Err(RendererError::PixelFormat(
                    "ChoosePixelFormat found no match for the probe window".to_string(),
                ));
            }
            if SetPixelFormat(hdc, format, &pfd) == 0 {
                return Err(RendererError::PixelFormat(
                    "SetPixelFormat failed for the probe window".to_string(),
                ));
            }

            let probe_context = wglCreateContext(hdc);
            if probe_context.is_null() {
                return Err(RendererError::ContextCreation(
                    "wglCreateContext failed".to_string(),
                ));
            }
            ledger.register(probe_context as usize, ResourceKind::Graphics, "probe GL context");

            if wglMakeCurrent(hdc, probe_context) == 0 {
                wglDeleteContext(probe_context);
                ledger.unregister(probe_context as usize);
                return Err(RendererError::MakeCurrent);
            }

            let opengl_module = LoadLibraryA(b"opengl32.dll\0".as_ptr() as *const c_char);
            if opengl_module.is_null() {
                wglMakeCurrent(ptr::null_mut(), ptr::null_mut());
                wglDeleteContext(probe_context);
                ledger.unregister(probe_context as usize);
                return Err(RendererError::ContextCreation(
                    "failed to load opengl32.dll".to_string(),
                ));
            }

            gl::load_with(|symbol| get_proc_address(opengl_module, symbol));

            let resolved: Result<
                (WglCreateContextAttribsArbFn, WglChoosePixelFormatArbFn),
                RendererError,
            > = (|| {
                super::verify_required_symbols()?;
                super::log_gl_version();

                let create_context_attribs = mem::transmute::<
                    *const c_void,
                    WglCreateContextAttribsArbFn,
                >(resolve_extension(
                    opengl_module,
                    "wglCreateContextAttribsARB",
                )?);
                let choose_pixel_format = mem::transmute::<
                    *const c_void,
                    WglChoosePixelFormatArbFn,
                >(resolve_extension(
                    opengl_module,
                    "wglChoosePixelFormatARB",
                )?);
                Ok((create_context_attribs, choose_pixel_format))
            })();

            // The probe context has served its purpose either way.
            wglMakeCurrent(ptr::null_mut(), ptr::null_mut());
            wglDeleteContext(probe_context);
            ledger.unregister(probe_context as usize);

            match resolved {
                Ok((create_context_attribs, choose_pixel_format)) => Ok(Self {
                    opengl_module,
                    create_context_attribs,
                    choose_pixel_format,
                    hdc: ptr::null_mut(),
                    hglrc: ptr::null_mut(),
                }),
                Err(err) => {
                    FreeLibrary(opengl_module);
                    Err(err)
                }
            }
        }
    }

    /// Phase B against the real window's device context.
    pub(crate) fn create_context(
        &mut self,
        platform: &Win32Platform,
        ledger: &LeakLedger,
    ) -> Result<(), RendererError> {
        let hdc = platform.hdc();

        unsafe {
            let pixel_attribs: [c_int; 19] = [
                WGL_DRAW_TO_WINDOW_ARB,
                1,
                WGL_SUPPORT_OPENGL_ARB,
                1,
                WGL_DOUBLE_BUFFER_ARB,
                1,
                WGL_SWAP_METHOD_ARB,
                WGL_SWAP_COPY_ARB,
                WGL_PIXEL_TYPE_ARB,
                WGL_TYPE_RGBA_ARB,
                WGL_ACCELERATION_ARB,
                WGL_FULL_ACCELERATION_ARB,
                WGL_COLOR_BITS_ARB,
                32,
                WGL_DEPTH_BITS_ARB,
                24,
                WGL_ALPHA_BITS_ARB,
                8,
                0,
            ];

            let mut format: c_int = 0;
            let mut matches: UINT = 0;
            let found = (self.choose_pixel_format)(
                hdc,
                pixel_attribs.as_ptr(),
                ptr::null(),
                1,
                &mut format,
                &mut matches,
            );
            if found == 0 || matches == 0 {
                return Err(RendererError::PixelFormat(
                    "wglChoosePixelFormatARB found no match".to_string(),
                ));
            }

            let mut pfd: PIXELFORMATDESCRIPTOR = mem::zeroed();
            let described = DescribePixelFormat(
                hdc,
                format,
                mem::size_of::<PIXELFORMATDESCRIPTOR>() as UINT,
                &mut pfd,
            );
            if described == 0 {
                return Err(RendererError::PixelFormat(
                    "DescribePixelFormat failed".to_string(),
                ));
            }
            if SetPixelFormat(hdc, format, &pfd) == 0 {
                return Err(RendererError::PixelFormat(
                    "SetPixelFormat failed".to_string(),
                ));
            }

            let context_attribs: [c_int; 9] = [
                WGL_CONTEXT_MAJOR_VERSION_ARB,
                4,
                WGL_CONTEXT_MINOR_VERSION_ARB,
                3,
                WGL_CONTEXT_PROFILE_MASK_ARB,
                WGL_CONTEXT_CORE_PROFILE_BIT_ARB,
                WGL_CONTEXT_FLAGS_ARB,
                WGL_CONTEXT_DEBUG_BIT_ARB,
                0,
            ];

            let context =
                (self.create_context_attribs)(hdc, ptr::null_mut(), context_attribs.as_ptr());
            if context.is_null() {
                return Err(RendererError::ContextCreation(
                    "wglCreateContextAttribsARB failed".to_string(),
                ));
            }
            ledger.register(context as usize, ResourceKind::Graphics, "GL context");

            if wglMakeCurrent(hdc, context) == 0 {
                wglDeleteContext(context);
                ledger.unregister(context as usize);
                return Err(RendererError::MakeCurrent);
            }

            self.hdc = hdc;
            self.hglrc = context;
        }

        Ok(())
    }

    /// Present the back buffer.
    pub(crate) fn swap_buffers(&self) {
        unsafe {
            SwapBuffers(self.hdc);
        }
    }

    /// Unbind and destroy the persistent context.
    pub(crate) fn destroy_context(&mut self, ledger: &LeakLedger) {
        unsafe {
            wglMakeCurrent(ptr::null_mut(), ptr::null_mut());
            wglDeleteContext(self.hglrc);
        }
        ledger.unregister(self.hglrc as usize);
        self.hglrc = ptr::null_mut();
        self.hdc = ptr::null_mut();
    }

    /// Release the opengl32 module handle.
    pub(crate) fn shutdown(&mut self) {
        if !self.opengl_module.is_null() {
            unsafe {
                FreeLibrary(self.opengl_module);
            }
            self.opengl_module = ptr::null_mut();
        }
    }
}

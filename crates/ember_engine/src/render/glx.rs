//! GLX context back end
//!
//! Phase A creates a legacy `glXCreateContext` context against the probe
//! window's visual to resolve entry points through `glXGetProcAddress`;
//! Phase B attaches an attributed core-profile context to the framebuffer
//! configuration the platform negotiated at window creation.

use std::ffi::CString;
use std::os::raw::{c_int, c_uchar, c_void};
use std::{mem, ptr};

use x11_dl::glx;
use x11_dl::xlib;

use super::RendererError;
use crate::debug::leak_ledger::{LeakLedger, ResourceKind};
use crate::platform::x11::{X11Platform, FRAMEBUFFER_ATTRIBS};

// GLX_ARB_create_context tokens (glxext.h).
const GLX_CONTEXT_MAJOR_VERSION_ARB: c_int = 0x2091;
const GLX_CONTEXT_MINOR_VERSION_ARB: c_int = 0x2092;
const GLX_CONTEXT_FLAGS_ARB: c_int = 0x2094;
const GLX_CONTEXT_PROFILE_MASK_ARB: c_int = 0x9126;
const GLX_CONTEXT_DEBUG_BIT_ARB: c_int = 0x0001;
const GLX_CONTEXT_CORE_PROFILE_BIT_ARB: c_int = 0x0001;

type GlxCreateContextAttribsArbFn = unsafe extern "C" fn(
    *mut xlib::Display,
    glx::GLXFBConfig,
    glx::GLXContext,
    xlib::Bool,
    *const c_int,
) -> glx::GLXContext;

/// GLX implementation of the context back end.
pub struct GlxBackend {
    xlib: xlib::Xlib,
    glx: glx::Glx,
    create_context_attribs: GlxCreateContextAttribsArbFn,
    display: *mut xlib::Display,
    window: xlib::Window,
    context: glx::GLXContext,
}

fn get_proc_address(glx_lib: &glx::Glx, symbol: &str) -> *const c_void {
    let name = CString::new(symbol).unwrap();
    unsafe {
        match (glx_lib.glXGetProcAddress)(name.as_ptr() as *const c_uchar) {
            Some(address) => address as usize as *const c_void,
            None => ptr::null(),
        }
    }
}

impl GlxBackend {
    /// Phase A against the probe window.
    pub(crate) fn probe(
        platform: &X11Platform,
        ledger: &LeakLedger,
    ) -> Result<Self, RendererError> {
        let xlib = xlib::Xlib::open().map_err(|err| {
            RendererError::ContextCreation(format!("failed to load Xlib: {}", err))
        })?;
        let glx_lib = glx::Glx::open().map_err(|err| {
            RendererError::ContextCreation(format!("failed to load GLX: {}", err))
        })?;

        let display = platform.display();

        unsafe {
            let screen = (xlib.XDefaultScreen)(display);

            let mut count: c_int = 0;
            let fb_configs = (glx_lib.glXChooseFBConfig)(
                display,
                screen,
                FRAMEBUFFER_ATTRIBS.as_ptr(),
                &mut count,
            );
            if fb_configs.is_null() || count == 0 {
                return Err(RendererError::PixelFormat(
                    "no matching GLX framebuffer config for the probe window".to_string(),
                ));
            }
            ledger.register(
                fb_configs as usize,
                ResourceKind::Graphics,
                "probe framebuffer config list",
            );

            let visual_info = (glx_lib.glXGetVisualFromFBConfig)(display, *fb_configs);
            if visual_info.is_null() {
                (xlib.XFree)(fb_configs as *mut _);
                ledger.unregister(fb_configs as usize);
                return Err(RendererError::PixelFormat(
                    "glXGetVisualFromFBConfig failed for the probe window".to_string(),
                ));
            }
            ledger.register(visual_info as usize, ResourceKind::Custom, "probe visual info");

            (xlib.XFree)(fb_configs as *mut _);
            ledger.unregister(fb_configs as usize);

            let probe_context =
                (glx_lib.glXCreateContext)(display, visual_info, ptr::null_mut(), xlib::True);
            if probe_context.is_null() {
                (xlib.XFree)(visual_info as *mut _);
                ledger.unregister(visual_info as usize);
                return Err(RendererError::ContextCreation(
                    "glXCreateContext failed".to_string(),
                ));
            }
            ledger.register(probe_context as usize, ResourceKind::Graphics, "probe GL context");

            (xlib.XFree)(visual_info as *mut _);
            ledger.unregister(visual_info as usize);

            if (glx_lib.glXMakeCurrent)(display, platform.window(), probe_context) == 0 {
                (glx_lib.glXDestroyContext)(display, probe_context);
                ledger.unregister(probe_context as usize);
                return Err(RendererError::MakeCurrent);
            }

            gl::load_with(|symbol| get_proc_address(&glx_lib, symbol));

            let resolved: Result<GlxCreateContextAttribsArbFn, RendererError> = (|| {
                super::verify_required_symbols()?;
                super::log_gl_version();

                let address = get_proc_address(&glx_lib, "glXCreateContextAttribsARB");
                if address.is_null() {
                    log::error!(
                        "failed to resolve extension entry point: glXCreateContextAttribsARB"
                    );
                    return Err(RendererError::MissingEntryPoints(
                        "glXCreateContextAttribsARB".to_string(),
                    ));
                }
                Ok(mem::transmute::<*const c_void, GlxCreateContextAttribsArbFn>(address))
            })();

            // The probe context has served its purpose either way.
            (glx_lib.glXMakeCurrent)(display, 0, ptr::null_mut());
            (glx_lib.glXDestroyContext)(display, probe_context);
            ledger.unregister(probe_context as usize);

            let create_context_attribs = resolved?;

            Ok(Self {
                xlib,
                glx: glx_lib,
                create_context_attribs,
                display: ptr::null_mut(),
                window: 0,
                context: ptr::null_mut(),
            })
        }
    }

    /// Phase B against the real window's framebuffer configuration.
    pub(crate) fn create_context(
        &mut self,
        platform: &X11Platform,
        ledger: &LeakLedger,
    ) -> Result<(), RendererError> {
        let display = platform.display();

        unsafe {
            let context_attribs: [c_int; 9] = [
                GLX_CONTEXT_MAJOR_VERSION_ARB,
                3,
                GLX_CONTEXT_MINOR_VERSION_ARB,
                3,
                GLX_CONTEXT_PROFILE_MASK_ARB,
                GLX_CONTEXT_CORE_PROFILE_BIT_ARB,
                GLX_CONTEXT_FLAGS_ARB,
                GLX_CONTEXT_DEBUG_BIT_ARB,
                0,
            ];

            let context = (self.create_context_attribs)(
                display,
                platform.fb_config(),
                ptr::null_mut(),
                xlib::True,
                context_attribs.as_ptr(),
            );
            if context.is_null() {
                return Err(RendererError::ContextCreation(
                    "glXCreateContextAttribsARB failed".to_string(),
                ));
            }
            ledger.register(context as usize, ResourceKind::Graphics, "GL context");

            if (self.glx.glXMakeCurrent)(display, platform.window(), context) == 0 {
                (self.glx.glXDestroyContext)(display, context);
                ledger.unregister(context as usize);
                return Err(RendererError::MakeCurrent);
            }

            (self.xlib.XFlush)(display);

            self.display = display;
            self.window = platform.window();
            self.context = context;
        }

        Ok(())
    }

    /// Present the back buffer.
    pub(crate) fn swap_buffers(&self) {
        unsafe {
            (self.glx.glXSwapBuffers)(self.display, self.window);
        }
    }

    /// Unbind and destroy the persistent context.
    pub(crate) fn destroy_context(&mut self, ledger: &LeakLedger) {
        unsafe {
            (self.glx.glXMakeCurrent)(self.display, 0, ptr::null_mut());
            (self.glx.glXDestroyContext)(self.display, self.context);
        }
        ledger.unregister(self.context as usize);
        self.context = ptr::null_mut();
        self.display = ptr::null_mut();
        self.window = 0;
    }

    /// Nothing to release here; the dynamically loaded libraries are
    /// dropped with the back end.
    pub(crate) fn shutdown(&mut self) {}
}

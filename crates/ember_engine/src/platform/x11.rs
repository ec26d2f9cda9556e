//! X11 windowing back end
//!
//! Xlib and GLX are loaded dynamically (`x11-dl`), so there is no
//! link-time dependency on the X libraries. The real window negotiates a
//! GLX framebuffer configuration at creation time (the renderer's
//! persistent context attaches to it later) and joins the
//! `WM_DELETE_WINDOW` protocol so window-manager close requests arrive as
//! client messages instead of connection drops.

use std::ffi::CString;
use std::os::raw::{c_int, c_uint};
use std::{mem, ptr};

use raw_window_handle::{
    HasRawDisplayHandle, HasRawWindowHandle, RawDisplayHandle, RawWindowHandle,
    XlibDisplayHandle, XlibWindowHandle,
};
use x11_dl::glx;
use x11_dl::xlib;

use crate::debug::leak_ledger::{LeakLedger, ResourceKind};
use crate::platform::{PlatformError, ScreenSize};

/// X11 implementation of the platform surface.
pub struct X11Platform {
    xlib: xlib::Xlib,
    glx: glx::Glx,
    display: *mut xlib::Display,
    window: xlib::Window,
    wm_delete_atom: xlib::Atom,
    // Config list returned by glXChooseFBConfig; freed at destroy_window.
    fb_configs: *mut glx::GLXFBConfig,
    fb_config: glx::GLXFBConfig,
    colormap: xlib::Colormap,
    screen_size: ScreenSize,
    close_requested: bool,
}

/// Framebuffer attributes shared by window creation and the context probe:
/// RGBA8 true-color, 24-bit depth, 8-bit stencil, double-buffered.
pub(crate) const FRAMEBUFFER_ATTRIBS: [c_int; 23] = [
    glx::GLX_X_RENDERABLE,
    1,
    glx::GLX_DRAWABLE_TYPE,
    glx::GLX_WINDOW_BIT,
    glx::GLX_RENDER_TYPE,
    glx::GLX_RGBA_BIT,
    glx::GLX_X_VISUAL_TYPE,
    glx::GLX_TRUE_COLOR,
    glx::GLX_RED_SIZE,
    8,
    glx::GLX_GREEN_SIZE,
    8,
    glx::GLX_BLUE_SIZE,
    8,
    glx::GLX_ALPHA_SIZE,
    8,
    glx::GLX_DEPTH_SIZE,
    24,
    glx::GLX_STENCIL_SIZE,
    8,
    glx::GLX_DOUBLEBUFFER,
    1,
    0,
];

impl X11Platform {
    /// Open the display connection and intern the close-protocol atom.
    pub fn init(ledger: &LeakLedger) -> Result<Self, PlatformError> {
        let xlib = xlib::Xlib::open()
            .map_err(|err| PlatformError::Init(format!("failed to load Xlib: {}", err)))?;
        let glx = glx::Glx::open()
            .map_err(|err| PlatformError::Init(format!("failed to load GLX: {}", err)))?;

        unsafe {
            if (xlib.XInitThreads)() == 0 {
                return Err(PlatformError::Init("XInitThreads failed".to_string()));
            }

            let display = (xlib.XOpenDisplay)(ptr::null());
            if display.is_null() {
                return Err(PlatformError::Init("failed to open X11 display".to_string()));
            }
            ledger.register(display as usize, ResourceKind::OsHandle, "X11 display");

            let atom_name = CString::new("WM_DELETE_WINDOW").unwrap();
            let wm_delete_atom = (xlib.XInternAtom)(display, atom_name.as_ptr(), xlib::False);
            if wm_delete_atom == 0 {
                return Err(PlatformError::Init(
                    "failed to intern WM_DELETE_WINDOW".to_string(),
                ));
            }

            Ok(Self {
                xlib,
                glx,
                display,
                window: 0,
                wm_delete_atom,
                fb_configs: ptr::null_mut(),
                fb_config: ptr::null_mut(),
                colormap: 0,
                screen_size: ScreenSize::default(),
                close_requested: false,
            })
        }
    }

    /// Open the small probe window the context probe attaches to.
    pub fn create_dummy_window(&mut self, ledger: &LeakLedger) -> Result<(), PlatformError> {
        unsafe {
            let screen = (self.xlib.XDefaultScreen)(self.display);
            let root = (self.xlib.XRootWindow)(self.display, screen);

            let window = (self.xlib.XCreateSimpleWindow)(
                self.display,
                root,
                0,
                0,
                50,
                50,
                1,
                (self.xlib.XWhitePixel)(self.display, screen),
                (self.xlib.XBlackPixel)(self.display, screen),
            );
            if window == 0 {
                return Err(PlatformError::WindowCreation(
                    "XCreateSimpleWindow failed for the probe window".to_string(),
                ));
            }
            ledger.register(window as usize, ResourceKind::OsHandle, "X11 dummy window");

            self.window = window;
        }

        Ok(())
    }

    /// Release the probe window. The probe context must already be gone.
    pub fn destroy_dummy_window(&mut self, ledger: &LeakLedger) {
        unsafe {
            (self.xlib.XDestroyWindow)(self.display, self.window);
        }
        ledger.unregister(self.window as usize);
        self.window = 0;
    }

    /// Open the real window, centered on the default screen, with a
    /// negotiated framebuffer configuration and the close protocol joined.
    pub fn create_window(
        &mut self,
        width: i32,
        height: i32,
        title: &str,
        ledger: &LeakLedger,
    ) -> Result<(), PlatformError> {
        unsafe {
            let screen = (self.xlib.XDefaultScreen)(self.display);
            let root = (self.xlib.XRootWindow)(self.display, screen);

            let mut count: c_int = 0;
            let fb_configs = (self.glx.glXChooseFBConfig)(
                self.display,
                screen,
                FRAMEBUFFER_ATTRIBS.as_ptr(),
                &mut count,
            );
            if fb_configs.is_null() || count == 0 {
                return Err(PlatformError::WindowCreation(
                    "no matching GLX framebuffer config".to_string(),
                ));
            }
            ledger.register(
                fb_configs as usize,
                ResourceKind::OsHandle,
                "GLX framebuffer config list",
            );
            let fb_config = *fb_configs;

            let visual_info = (self.glx.glXGetVisualFromFBConfig)(self.display, fb_config);
            if visual_info.is_null() {
                return Err(PlatformError::WindowCreation(
                    "glXGetVisualFromFBConfig failed".to_string(),
                ));
            }
            ledger.register(visual_info as usize, ResourceKind::OsHandle, "X11 visual info");

            let colormap = (self.xlib.XCreateColormap)(
                self.display,
                root,
                (*visual_info).visual,
                xlib::AllocNone,
            );
            ledger.register(colormap as usize, ResourceKind::OsHandle, "X11 colormap");

            let mut attrs: xlib::XSetWindowAttributes = mem::zeroed();
            attrs.colormap = colormap;
            attrs.event_mask = xlib::ExposureMask | xlib::KeyPressMask | xlib::StructureNotifyMask;

            let screen_info = (self.xlib.XScreenOfDisplay)(self.display, screen);
            let x = ((*screen_info).width - width) / 2;
            let y = ((*screen_info).height - height) / 2;

            let window = (self.xlib.XCreateWindow)(
                self.display,
                root,
                x,
                y,
                width as c_uint,
                height as c_uint,
                1,
                (*visual_info).depth,
                xlib::InputOutput as c_uint,
                (*visual_info).visual,
                xlib::CWColormap | xlib::CWEventMask,
                &mut attrs,
            );
            if window == 0 {
                return Err(PlatformError::WindowCreation(
                    "XCreateWindow failed".to_string(),
                ));
            }
            ledger.register(window as usize, ResourceKind::OsHandle, "X11 window");

            let c_title = CString::new(title).unwrap_or_default();
            (self.xlib.XStoreName)(self.display, window, c_title.as_ptr());

            let mut wm_delete = self.wm_delete_atom;
            (self.xlib.XSetWMProtocols)(self.display, window, &mut wm_delete, 1);
            (self.xlib.XMapWindow)(self.display, window);
            (self.xlib.XFlush)(self.display);

            (self.xlib.XFree)(visual_info as *mut _);
            ledger.unregister(visual_info as usize);

            self.window = window;
            self.fb_configs = fb_configs;
            self.fb_config = fb_config;
            self.colormap = colormap;
            self.screen_size = ScreenSize { width, height };
        }

        Ok(())
    }

    /// Drain all pending events without blocking.
    ///
    /// Returns true the moment a window-manager close request is observed.
    pub fn pump_events(&mut self) -> bool {
        unsafe {
            while (self.xlib.XPending)(self.display) > 0 {
                let mut event: xlib::XEvent = mem::zeroed();
                (self.xlib.XNextEvent)(self.display, &mut event);

                match event.get_type() {
                    xlib::ClientMessage => {
                        let message: &xlib::XClientMessageEvent = event.as_ref();
                        if message.data.get_long(0) as xlib::Atom == self.wm_delete_atom {
                            self.close_requested = true;
                            break;
                        }
                    }
                    xlib::ConfigureNotify => {
                        let configure: &xlib::XConfigureEvent = event.as_ref();
                        self.screen_size = ScreenSize {
                            width: configure.width,
                            height: configure.height,
                        };
                    }
                    _ => {}
                }
            }
        }

        self.close_requested
    }

    /// Current drawable size in device pixels.
    pub fn screen_size(&self) -> ScreenSize {
        self.screen_size
    }

    /// Release the real window, reverse of [`create_window`].
    ///
    /// [`create_window`]: X11Platform::create_window
    pub fn destroy_window(&mut self, ledger: &LeakLedger) {
        unsafe {
            (self.xlib.XFreeColormap)(self.display, self.colormap);
            ledger.unregister(self.colormap as usize);
            (self.xlib.XDestroyWindow)(self.display, self.window);
            ledger.unregister(self.window as usize);
            (self.xlib.XFree)(self.fb_configs as *mut _);
            ledger.unregister(self.fb_configs as usize);
        }

        self.colormap = 0;
        self.window = 0;
        self.fb_configs = ptr::null_mut();
        self.fb_config = ptr::null_mut();
    }

    /// Close the display connection.
    pub fn shutdown(&mut self, ledger: &LeakLedger) {
        unsafe {
            (self.xlib.XCloseDisplay)(self.display);
        }
        ledger.unregister(self.display as usize);
        self.display = ptr::null_mut();
    }

    /// The open display connection.
    pub fn display(&self) -> *mut xlib::Display {
        self.display
    }

    /// Handle of the currently open window (probe or real).
    pub fn window(&self) -> xlib::Window {
        self.window
    }

    /// Framebuffer configuration negotiated at window creation.
    pub fn fb_config(&self) -> glx::GLXFBConfig {
        self.fb_config
    }
}

unsafe impl HasRawWindowHandle for X11Platform {
    fn raw_window_handle(&self) -> RawWindowHandle {
        let mut handle = XlibWindowHandle::empty();
        handle.window = self.window;
        RawWindowHandle::Xlib(handle)
    }
}

unsafe impl HasRawDisplayHandle for X11Platform {
    fn raw_display_handle(&self) -> RawDisplayHandle {
        let mut handle = XlibDisplayHandle::empty();
        handle.display = self.display as *mut _;
        RawDisplayHandle::Xlib(handle)
    }
}

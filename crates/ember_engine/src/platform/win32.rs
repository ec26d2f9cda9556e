//! Win32 windowing back end
//!
//! The probe window is created on the stock `"Static"` class so no class
//! registration is needed for it; the real window gets its own class,
//! centered placement within the work area, and a window procedure that
//! records close requests and client-area resizes.
//!
//! Per-window state travels through `GWLP_USERDATA` rather than statics:
//! the platform owns a boxed [`WindowState`] whose address is handed to
//! the window procedure after creation.

use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;
use std::{mem, ptr};

use raw_window_handle::{
    HasRawDisplayHandle, HasRawWindowHandle, RawDisplayHandle, RawWindowHandle,
    Win32WindowHandle, WindowsDisplayHandle,
};
use winapi::shared::basetsd::LONG_PTR;
use winapi::shared::minwindef::{LPARAM, LRESULT, UINT, WPARAM};
use winapi::shared::windef::{HDC, HWND, RECT};
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::libloaderapi::GetModuleHandleW;
use winapi::um::wingdi::{CreateSolidBrush, RGB};
use winapi::um::winuser::{
    AdjustWindowRectEx, CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW,
    GetClientRect, GetDC, GetWindowLongPtrW, LoadCursorW, LoadIconW, PeekMessageW,
    PostQuitMessage, RegisterClassExW, ReleaseDC, SetProcessDPIAware, SetWindowLongPtrW,
    ShowWindow, SystemParametersInfoW, TranslateMessage, UnregisterClassW, UpdateWindow,
    CS_HREDRAW, CS_VREDRAW, GWLP_USERDATA, IDC_ARROW, IDI_APPLICATION, MSG, PM_REMOVE,
    SPI_GETWORKAREA, SW_SHOW, WM_CLOSE, WM_QUIT, WM_SIZE, WNDCLASSEXW, WS_OVERLAPPEDWINDOW,
};

use crate::debug::leak_ledger::{LeakLedger, ResourceKind};
use crate::platform::{PlatformError, ScreenSize};

/// State shared with the window procedure.
struct WindowState {
    screen_size: ScreenSize,
    close_requested: bool,
}

/// Win32 implementation of the platform surface.
pub struct Win32Platform {
    state: Box<WindowState>,
    hwnd: HWND,
    hdc: HDC,
    // Wide window-class name; empty while no class is registered.
    class_name: Vec<u16>,
}

fn wide(text: &str) -> Vec<u16> {
    OsStr::new(text).encode_wide().chain(std::iter::once(0)).collect()
}

unsafe extern "system" fn wnd_proc(hwnd: HWND, msg: UINT, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    let state = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *mut WindowState;

    match msg {
        WM_CLOSE => {
            if !state.is_null() {
                (*state).close_requested = true;
            }
            PostQuitMessage(0);
            0
        }
        WM_SIZE => {
            if !state.is_null() {
                let mut rc: RECT = mem::zeroed();
                GetClientRect(hwnd, &mut rc);
                (*state).screen_size = ScreenSize {
                    width: rc.right - rc.left,
                    height: rc.bottom - rc.top,
                };
            }
            DefWindowProcW(hwnd, msg, wparam, lparam)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

unsafe fn centered_position(window_rect: &RECT) -> (i32, i32) {
    let mut work: RECT = mem::zeroed();
    SystemParametersInfoW(SPI_GETWORKAREA, 0, &mut work as *mut RECT as *mut _, 0);

    let work_w = work.right - work.left;
    let work_h = work.bottom - work.top;
    let win_w = window_rect.right - window_rect.left;
    let win_h = window_rect.bottom - window_rect.top;

    (
        work.left + (work_w - win_w) / 2,
        work.top + (work_h - win_h) / 2,
    )
}

impl Win32Platform {
    /// Establish the connection to the windowing subsystem.
    pub fn init(ledger: &LeakLedger) -> Result<Self, PlatformError> {
        // Opt out of DPI virtualization so the window is pixel-exact.
        unsafe {
            SetProcessDPIAware();
        }

        let state = Box::new(WindowState {
            screen_size: ScreenSize::default(),
            close_requested: false,
        });
        ledger.register(
            &*state as *const WindowState as usize,
            ResourceKind::Custom,
            "window state",
        );

        Ok(Self {
            state,
            hwnd: ptr::null_mut(),
            hdc: ptr::null_mut(),
            class_name: Vec::new(),
        })
    }

    /// Open the invisible probe window the context probe attaches to.
    pub fn create_dummy_window(&mut self, ledger: &LeakLedger) -> Result<(), PlatformError> {
        let class = wide("Static");
        let title = wide("Probe");

        unsafe {
            let hinstance = GetModuleHandleW(ptr::null());
            if hinstance.is_null() {
                return Err(PlatformError::WindowCreation(
                    "GetModuleHandleW returned null".to_string(),
                ));
            }

            let hwnd = CreateWindowExW(
                0,
                class.as_ptr(),
                title.as_ptr(),
                WS_OVERLAPPEDWINDOW,
                0,
                0,
                50,
                50,
                ptr::null_mut(),
                ptr::null_mut(),
                hinstance,
                ptr::null_mut(),
            );
            if hwnd.is_null() {
                return Err(PlatformError::WindowCreation(format!(
                    "CreateWindowExW failed for the probe window (error {})",
                    GetLastError()
                )));
            }
            ledger.register(hwnd as usize, ResourceKind::OsHandle, "dummy window");

            let hdc = GetDC(hwnd);
            if hdc.is_null() {
                return Err(PlatformError::WindowCreation(
                    "GetDC failed for the probe window".to_string(),
                ));
            }
            ledger.register(hdc as usize, ResourceKind::OsHandle, "dummy device context");

            self.hwnd = hwnd;
            self.hdc = hdc;
        }

        Ok(())
    }

    /// Release the probe window. The probe context must already be gone.
    pub fn destroy_dummy_window(&mut self, ledger: &LeakLedger) {
        unsafe {
            ReleaseDC(self.hwnd, self.hdc);
            ledger.unregister(self.hdc as usize);
            DestroyWindow(self.hwnd);
            ledger.unregister(self.hwnd as usize);
        }

        self.hwnd = ptr::null_mut();
        self.hdc = ptr::null_mut();
    }

    /// Open the real, visible window, centered within the work area.
    pub fn create_window(
        &mut self,
        width: i32,
        height: i32,
        title: &str,
        ledger: &LeakLedger,
    ) -> Result<(), PlatformError> {
        let class_name = wide(title);

        unsafe {
            let hinstance = GetModuleHandleW(ptr::null());
            if hinstance.is_null() {
                return Err(PlatformError::WindowCreation(
                    "GetModuleHandleW returned null".to_string(),
                ));
            }

            let mut wcex: WNDCLASSEXW = mem::zeroed();
            wcex.cbSize = mem::size_of::<WNDCLASSEXW>() as UINT;
            wcex.hInstance = hinstance;
            wcex.style = CS_HREDRAW | CS_VREDRAW;
            wcex.hCursor = LoadCursorW(ptr::null_mut(), IDC_ARROW);
            wcex.hIcon = LoadIconW(ptr::null_mut(), IDI_APPLICATION);
            wcex.hIconSm = LoadIconW(ptr::null_mut(), IDI_APPLICATION);
            wcex.lpszClassName = class_name.as_ptr();
            wcex.hbrBackground = CreateSolidBrush(RGB(0, 0, 0));
            wcex.lpfnWndProc = Some(wnd_proc);

            if RegisterClassExW(&wcex) == 0 {
                return Err(PlatformError::WindowCreation(format!(
                    "RegisterClassExW failed (error {})",
                    GetLastError()
                )));
            }

            let style = WS_OVERLAPPEDWINDOW;
            let mut rc = RECT {
                left: 0,
                top: 0,
                right: width,
                bottom: height,
            };
            AdjustWindowRectEx(&mut rc, style, 0, 0);
            let (x, y) = centered_position(&rc);

            let hwnd = CreateWindowExW(
                0,
                class_name.as_ptr(),
                class_name.as_ptr(),
                style,
                x,
                y,
                rc.right - rc.left,
                rc.bottom - rc.top,
                ptr::null_mut(),
                ptr::null_mut(),
                hinstance,
                ptr::null_mut(),
            );
            if hwnd.is_null() {
                return Err(PlatformError::WindowCreation(format!(
                    "CreateWindowExW failed (error {})",
                    GetLastError()
                )));
            }
            ledger.register(hwnd as usize, ResourceKind::OsHandle, "window");

            // Hand the window procedure its state before messages flow.
            SetWindowLongPtrW(
                hwnd,
                GWLP_USERDATA,
                &mut *self.state as *mut WindowState as LONG_PTR,
            );

            let hdc = GetDC(hwnd);
            if hdc.is_null() {
                return Err(PlatformError::WindowCreation(
                    "GetDC failed for the window".to_string(),
                ));
            }
            ledger.register(hdc as usize, ResourceKind::OsHandle, "device context");

            ShowWindow(hwnd, SW_SHOW);
            UpdateWindow(hwnd);

            self.state.screen_size = ScreenSize { width, height };
            self.hwnd = hwnd;
            self.hdc = hdc;
            self.class_name = class_name;
        }

        Ok(())
    }

    /// Drain all pending messages without blocking.
    ///
    /// Returns true the moment a close/quit event has been observed.
    pub fn pump_events(&mut self) -> bool {
        unsafe {
            let mut msg: MSG = mem::zeroed();
            while PeekMessageW(&mut msg, ptr::null_mut(), 0, 0, PM_REMOVE) != 0 {
                if msg.message == WM_QUIT {
                    self.state.close_requested = true;
                    break;
                }
                TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        self.state.close_requested
    }

    /// Current client-area size in device pixels.
    pub fn screen_size(&self) -> ScreenSize {
        self.state.screen_size
    }

    /// Release the real window, reverse of [`create_window`].
    ///
    /// [`create_window`]: Win32Platform::create_window
    pub fn destroy_window(&mut self, ledger: &LeakLedger) {
        unsafe {
            ReleaseDC(self.hwnd, self.hdc);
            ledger.unregister(self.hdc as usize);
            DestroyWindow(self.hwnd);
            ledger.unregister(self.hwnd as usize);

            UnregisterClassW(self.class_name.as_ptr(), GetModuleHandleW(ptr::null()));
        }

        self.hwnd = ptr::null_mut();
        self.hdc = ptr::null_mut();
        self.class_name = Vec::new();
    }

    /// Release the remaining platform state.
    pub fn shutdown(&mut self, ledger: &LeakLedger) {
        ledger.unregister(&*self.state as *const WindowState as usize);
    }

    /// Device context of the currently open window (probe or real).
    pub fn hdc(&self) -> HDC {
        self.hdc
    }

    /// Handle of the currently open window (probe or real).
    pub fn hwnd(&self) -> HWND {
        self.hwnd
    }
}

unsafe impl HasRawWindowHandle for Win32Platform {
    fn raw_window_handle(&self) -> RawWindowHandle {
        let mut handle = Win32WindowHandle::empty();
        handle.hwnd = self.hwnd as *mut _;
        handle.hinstance = unsafe { GetModuleHandleW(ptr::null()) } as *mut _;
        RawWindowHandle::Win32(handle)
    }
}

unsafe impl HasRawDisplayHandle for Win32Platform {
    fn raw_display_handle(&self) -> RawDisplayHandle {
        RawDisplayHandle::Windows(WindowsDisplayHandle::empty())
    }
}

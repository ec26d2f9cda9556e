//! Context bring-up and the per-frame draw
//!
//! Bring-up is a two-phase protocol. The entry points needed to create a
//! fully specified (versioned, core-profile) context are themselves
//! extension functions that can only be resolved once *some* context is
//! current, so:
//!
//! - **Phase A** ([`Renderer::probe`]): a minimal legacy context is
//!   created against the probe window, all required OpenGL entry points
//!   plus the extended `*CreateContextAttribsARB` are resolved, the
//!   driver's version string is logged, and the probe context is
//!   destroyed. The result is a [`RendererProbe`].
//! - **Phase B** ([`RendererProbe::create_context`]): consumes the probe
//!   and creates the persistent context against the real window, compiles
//!   and links the draw program from the shader files, sets up the vertex
//!   state object and the reversed-depth fixed state.
//!
//! The consuming typestate makes "probe context destroyed before the
//! persistent context exists" a compile-time property. Every handle
//! created in either phase is registered with the leak ledger and
//! unregistered at the matching destroy call in phase-reversed order;
//! every early return during bring-up releases the handles acquired so
//! far in that phase.

use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::sync::atomic::{AtomicBool, Ordering};

use gl::types::{GLchar, GLenum, GLsizei, GLuint};
use thiserror::Error;

use crate::config::ShaderConfig;
use crate::debug::leak_ledger::{LeakLedger, ResourceKind};
use crate::foundation::memory::ScratchAllocator;
use crate::platform::{NativePlatform, ScreenSize};

pub mod shader;

#[cfg(target_os = "linux")]
pub mod glx;

#[cfg(windows)]
pub mod wgl;

#[cfg(windows)]
use wgl::WglBackend as NativeBackend;

#[cfg(target_os = "linux")]
use glx::GlxBackend as NativeBackend;

/// The bootstrap draw is a fixed pair of triangles.
const QUAD_VERTEX_COUNT: i32 = 6;

/// Renderer errors. Every variant is fatal for the bootstrap.
#[derive(Error, Debug)]
pub enum RendererError {
    /// No pixel/framebuffer configuration matched the request
    #[error("pixel format selection failed: {0}")]
    PixelFormat(String),

    /// Context creation was refused by the driver
    #[error("context creation failed: {0}")]
    ContextCreation(String),

    /// The context could not be bound to the window
    #[error("failed to make the context current")]
    MakeCurrent,

    /// One or more required entry points stayed unresolved
    #[error("unresolved graphics entry point(s): {0}")]
    MissingEntryPoints(String),

    /// A shader source file could not be staged
    #[error("failed to read shader source: {0}")]
    ShaderRead(String),

    /// A shader stage failed to compile
    #[error("{stage} shader failed to compile: {info_log}")]
    ShaderCompile {
        /// Which stage failed
        stage: &'static str,
        /// The driver's compiler diagnostic
        info_log: String,
    },

    /// The draw program failed to link
    #[error("shader program failed to link: {info_log}")]
    ProgramLink {
        /// The driver's linker diagnostic
        info_log: String,
    },

    /// The driver reported an error-severity debug message during bring-up
    #[error("the graphics driver reported an error during bring-up")]
    DebugMessage,
}

/// Phase A result: entry points resolved, probe context already destroyed.
pub struct RendererProbe {
    backend: NativeBackend,
}

/// The persistent rendering context, draw program and vertex state.
///
/// Created once per session; destroyed exactly once, after the session
/// loop ends and before the window is destroyed.
pub struct Renderer {
    backend: NativeBackend,
    program: GLuint,
    vao: GLuint,
    // Flipped by the debug callback on error-severity messages; boxed so
    // the address handed to the driver stays stable.
    debug_flag: Box<AtomicBool>,
}

impl Renderer {
    /// Phase A: probe capabilities and resolve entry points against the
    /// platform's dummy window.
    pub fn probe(
        platform: &NativePlatform,
        ledger: &LeakLedger,
    ) -> Result<RendererProbe, RendererError> {
        let backend = NativeBackend::probe(platform, ledger)?;
        Ok(RendererProbe { backend })
    }

    /// Issue one frame: clear, viewport, fixed draw, present.
    pub fn draw_frame(&mut self, size: ScreenSize) {
        unsafe {
            gl::ClearColor(0.0, 0.0, 0.0, 1.0);
            // Reversed depth: far plane clears to zero, nearer wins with
            // GL_GREATER.
            gl::ClearDepth(0.0);
            gl::Clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT);

            gl::Viewport(0, 0, size.width, size.height);
            gl::DrawArrays(gl::TRIANGLES, 0, QUAD_VERTEX_COUNT);
        }

        self.backend.swap_buffers();
    }

    /// Destroy the persistent context and everything living in it,
    /// phase-reversed: vertex state, program, then the context itself.
    pub fn destroy_context(&mut self, ledger: &LeakLedger) {
        unsafe {
            gl::BindVertexArray(0);
            gl::DeleteVertexArrays(1, &self.vao);
            ledger.unregister(self.vao as usize);

            gl::UseProgram(0);
            gl::DeleteProgram(self.program);
            ledger.unregister(self.program as usize);
        }
        self.vao = 0;
        self.program = 0;

        self.backend.destroy_context(ledger);
    }

    /// Release what the probe loaded (the GL module handle on Win32).
    pub fn shutdown(&mut self) {
        self.backend.shutdown();
    }
}

impl RendererProbe {
    /// Phase B: create the persistent context against the real window and
    /// build the draw pipeline.
    pub fn create_context(
        self,
        platform: &NativePlatform,
        scratch: &mut ScratchAllocator,
        ledger: &LeakLedger,
        shaders: &ShaderConfig,
    ) -> Result<Renderer, RendererError> {
        let mut backend = self.backend;
        backend.create_context(platform, ledger)?;

        let debug_flag = Box::new(AtomicBool::new(false));
        match build_pipeline(scratch, ledger, shaders, &debug_flag) {
            Ok((program, vao)) => Ok(Renderer {
                backend,
                program,
                vao,
                debug_flag,
            }),
            Err(err) => {
                // Release the context so a failed bring-up leaves no
                // phase B handles behind.
                backend.destroy_context(ledger);
                Err(err)
            }
        }
    }
}

/// Compile, link and configure the draw pipeline on the current context.
///
/// On failure everything registered by this function has been released
/// again; the caller only has the bare context to clean up.
fn build_pipeline(
    scratch: &mut ScratchAllocator,
    ledger: &LeakLedger,
    shaders: &ShaderConfig,
    debug_flag: &AtomicBool,
) -> Result<(GLuint, GLuint), RendererError> {
    install_debug_callback(debug_flag);

    let vertex_path = std::path::Path::new(&shaders.vertex_path);
    let fragment_path = std::path::Path::new(&shaders.fragment_path);

    let vertex_block = crate::assets::file_io::read_file(vertex_path, scratch)
        .ok_or_else(|| RendererError::ShaderRead(shaders.vertex_path.clone()))?;
    let fragment_block = crate::assets::file_io::read_file(fragment_path, scratch)
        .ok_or_else(|| RendererError::ShaderRead(shaders.fragment_path.clone()))?;

    let vertex_stage = shader::compile_stage(gl::VERTEX_SHADER, "vertex", scratch.bytes(vertex_block))?;
    let fragment_stage =
        match shader::compile_stage(gl::FRAGMENT_SHADER, "fragment", scratch.bytes(fragment_block)) {
            Ok(stage) => stage,
            Err(err) => {
                unsafe { gl::DeleteShader(vertex_stage) };
                return Err(err);
            }
        };

    // link_program detaches and deletes both stages whatever the outcome.
    let program = shader::link_program(vertex_stage, fragment_stage)?;
    ledger.register(program as usize, ResourceKind::Graphics, "GL program");

    let mut vao: GLuint = 0;
    unsafe {
        gl::GenVertexArrays(1, &mut vao);
        gl::BindVertexArray(vao);
    }
    ledger.register(vao as usize, ResourceKind::Graphics, "GL vertex array");

    unsafe {
        gl::Enable(gl::DEPTH_TEST);
        gl::DepthFunc(gl::GREATER);
        gl::UseProgram(program);
    }

    if debug_flag.load(Ordering::Relaxed) {
        unsafe {
            gl::BindVertexArray(0);
            gl::DeleteVertexArrays(1, &vao);
            ledger.unregister(vao as usize);
            gl::UseProgram(0);
            gl::DeleteProgram(program);
            ledger.unregister(program as usize);
        }
        return Err(RendererError::DebugMessage);
    }

    Ok((program, vao))
}

/// Verify that every entry point the renderer calls was resolved.
///
/// Each missing symbol gets its own diagnostic; any missing symbol is
/// fatal for bring-up (the resolver itself never fails).
pub(crate) fn verify_required_symbols() -> Result<(), RendererError> {
    let mut missing: Vec<&'static str> = Vec::new();

    macro_rules! require {
        ($name:ident) => {
            if !gl::$name::is_loaded() {
                log::error!(concat!(
                    "failed to resolve OpenGL entry point: gl",
                    stringify!($name)
                ));
                missing.push(concat!("gl", stringify!($name)));
            }
        };
    }

    require!(AttachShader);
    require!(BindVertexArray);
    require!(Clear);
    require!(ClearColor);
    require!(ClearDepth);
    require!(CompileShader);
    require!(CreateProgram);
    require!(CreateShader);
    require!(DeleteProgram);
    require!(DeleteShader);
    require!(DeleteVertexArrays);
    require!(DepthFunc);
    require!(DetachShader);
    require!(DrawArrays);
    require!(Enable);
    require!(GenVertexArrays);
    require!(GetProgramInfoLog);
    require!(GetProgramiv);
    require!(GetShaderInfoLog);
    require!(GetShaderiv);
    require!(GetString);
    require!(LinkProgram);
    require!(ShaderSource);
    require!(UseProgram);
    require!(Viewport);

    if missing.is_empty() {
        Ok(())
    } else {
        Err(RendererError::MissingEntryPoints(missing.join(", ")))
    }
}

/// Log the driver's version string for diagnostics.
pub(crate) fn log_gl_version() {
    unsafe {
        let version = gl::GetString(gl::VERSION);
        if !version.is_null() {
            let version = CStr::from_ptr(version as *const c_char);
            log::info!("OpenGL version: {}", version.to_string_lossy());
        }
    }
}

/// Route driver debug messages into the log; error severity also flips
/// the bring-up failure flag passed as the user parameter.
extern "system" fn gl_debug_callback(
    _source: GLenum,
    _message_type: GLenum,
    _id: GLuint,
    severity: GLenum,
    length: GLsizei,
    message: *const GLchar,
    user_param: *mut c_void,
) {
    let text = if message.is_null() || length < 0 {
        String::new()
    } else {
        let bytes =
            unsafe { std::slice::from_raw_parts(message as *const u8, length as usize) };
        String::from_utf8_lossy(bytes).into_owned()
    };

    if severity == gl::DEBUG_SEVERITY_HIGH {
        log::error!("OpenGL error: {}", text);
        if !user_param.is_null() {
            let flag = unsafe { &*(user_param as *const AtomicBool) };
            flag.store(true, Ordering::Relaxed);
        }
    } else {
        log::trace!("OpenGL: {}", text);
    }
}

fn install_debug_callback(flag: &AtomicBool) {
    // Only present on debug-capable contexts (4.3+ / KHR_debug).
    if gl::DebugMessageCallback::is_loaded() {
        unsafe {
            gl::Enable(gl::DEBUG_OUTPUT);
            gl::Enable(gl::DEBUG_OUTPUT_SYNCHRONOUS);
            gl::DebugMessageCallback(
                Some(gl_debug_callback),
                flag as *const AtomicBool as *const c_void,
            );
        }
    }
}

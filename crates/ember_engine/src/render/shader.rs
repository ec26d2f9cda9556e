//! Shader stage compilation and program linking
//!
//! Compile status is checked per stage; a failure surfaces the driver's
//! info log verbatim. Stages are detached and deleted as soon as the link
//! result is known; they are not needed after linking.

use gl::types::{GLchar, GLenum, GLint, GLsizei, GLuint};

use super::RendererError;

const INFO_LOG_CAPACITY: usize = 2048;

/// Compile one shader stage from raw source bytes.
///
/// The stage is deleted again on a failed compile.
pub(crate) fn compile_stage(
    kind: GLenum,
    stage: &'static str,
    source: &[u8],
) -> Result<GLuint, RendererError> {
    unsafe {
        let id = gl::CreateShader(kind);

        let ptr = source.as_ptr() as *const GLchar;
        let len = source.len() as GLint;
        gl::ShaderSource(id, 1, &ptr, &len);
        gl::CompileShader(id);

        let mut status: GLint = 0;
        gl::GetShaderiv(id, gl::COMPILE_STATUS, &mut status);
        if status == 0 {
            let info_log = shader_info_log(id);
            gl::DeleteShader(id);
            return Err(RendererError::ShaderCompile { stage, info_log });
        }

        Ok(id)
    }
}

/// Link two compiled stages into one program.
///
/// Both stages are detached and deleted whatever the outcome; on a failed
/// link the program object is deleted as well.
pub(crate) fn link_program(vertex: GLuint, fragment: GLuint) -> Result<GLuint, RendererError> {
    unsafe {
        let program = gl::CreateProgram();
        gl::AttachShader(program, vertex);
        gl::AttachShader(program, fragment);
        gl::LinkProgram(program);

        let mut status: GLint = 0;
        gl::GetProgramiv(program, gl::LINK_STATUS, &mut status);

        gl::DetachShader(program, vertex);
        gl::DetachShader(program, fragment);
        gl::DeleteShader(vertex);
        gl::DeleteShader(fragment);

        if status == 0 {
            let info_log = program_info_log(program);
            gl::DeleteProgram(program);
            return Err(RendererError::ProgramLink { info_log });
        }

        Ok(program)
    }
}

unsafe fn shader_info_log(id: GLuint) -> String {
    let mut buffer = vec![0u8; INFO_LOG_CAPACITY];
    let mut length: GLsizei = 0;
    gl::GetShaderInfoLog(
        id,
        buffer.len() as GLsizei,
        &mut length,
        buffer.as_mut_ptr() as *mut GLchar,
    );
    trim_log(&buffer, length)
}

unsafe fn program_info_log(id: GLuint) -> String {
    let mut buffer = vec![0u8; INFO_LOG_CAPACITY];
    let mut length: GLsizei = 0;
    gl::GetProgramInfoLog(
        id,
        buffer.len() as GLsizei,
        &mut length,
        buffer.as_mut_ptr() as *mut GLchar,
    );
    trim_log(&buffer, length)
}

fn trim_log(buffer: &[u8], length: GLsizei) -> String {
    let length = (length.max(0) as usize).min(buffer.len());
    String::from_utf8_lossy(&buffer[..length]).trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_log_clamps_driver_lengths() {
        assert_eq!(trim_log(b"error: oops\n\0\0", 12), "error: oops");
        assert_eq!(trim_log(b"abc", -1), "");
        assert_eq!(trim_log(b"abc", 99), "abc");
    }
}

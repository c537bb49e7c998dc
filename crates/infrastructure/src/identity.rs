//! 当前进程的调用者身份

use std::ffi::CStr;

use report_core::Identity;
use tracing::debug;

const LOGIN_VARS: &[&str] = &["USER", "LOGNAME", "USERNAME"];

/// 登录名取自环境变量，有效身份取自有效uid对应的账户名
///
/// sudo等提权运行时两者不同。查不到账户名时使用uid数字。
pub fn current_identity() -> Identity {
    // SAFETY: geteuid 总是成功且没有副作用
    let euid = unsafe { libc::geteuid() };
    let effective = user_name_for_uid(euid).unwrap_or_else(|| euid.to_string());
    let username = login_name().unwrap_or_else(|| effective.clone());

    let identity = Identity::new(username, effective);
    debug!("当前身份: {}", identity);
    identity
}

fn login_name() -> Option<String> {
    LOGIN_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty())
}

/// 通过passwd数据库查找uid对应的账户名
pub fn user_name_for_uid(uid: libc::uid_t) -> Option<String> {
    let mut buf = vec![0 as libc::c_char; 4096];
    // SAFETY: passwd 是纯数据结构，全零是合法的初始值
    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut result: *mut libc::passwd = std::ptr::null_mut();

    loop {
        // SAFETY: 所有指针都指向本函数内存活的缓冲区，buf长度与传入的长度一致
        let rc = unsafe {
            libc::getpwuid_r(uid, &mut pwd, buf.as_mut_ptr(), buf.len(), &mut result)
        };

        if rc == libc::ERANGE && buf.len() < 1 << 20 {
            let len = buf.len() * 2;
            buf.resize(len, 0);
            continue;
        }
        if rc != 0 || result.is_null() || pwd.pw_name.is_null() {
            return None;
        }

        // SAFETY: 调用成功时 pw_name 指向buf中以NUL结尾的字符串
        let name = unsafe { CStr::from_ptr(pwd.pw_name) };
        return Some(name.to_string_lossy().into_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_identity_is_populated() {
        let identity = current_identity();
        assert!(!identity.username.is_empty());
        assert!(!identity.euid.is_empty());
    }

    #[test]
    fn test_root_uid_resolves() {
        assert_eq!(user_name_for_uid(0).as_deref(), Some("root"));
    }
}

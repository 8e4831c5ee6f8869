use std::{
    env,
    path::{Path, PathBuf},
};

/// Resolves an executable the way a shell would: paths are checked as given,
/// bare names are searched for on `PATH`.
pub fn find_executable<S: AsRef<str>>(name: S) -> Option<PathBuf> {
    let name = name.as_ref();
    let candidate = Path::new(name);

    if candidate.components().count() > 1 {
        return if is_executable(candidate) {
            Some(candidate.to_path_buf())
        } else {
            None
        };
    }

    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .flat_map(|dir| executable_names(name).into_iter().map(move |n| dir.join(n)))
        .find(|path| is_executable(path))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(windows)]
fn executable_names(name: &str) -> Vec<String> {
    vec![
        name.to_string(),
        format!("{}.exe", name),
        format!("{}.cmd", name),
    ]
}

#[cfg(not(windows))]
fn executable_names(name: &str) -> Vec<String> {
    vec![name.to_string()]
}

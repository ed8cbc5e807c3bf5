//! In-memory virtual filesystem implementing [`Runtime`].
//!
//! Paths are absolute. Symlinks are resolved component by component like a
//! real filesystem, parent directories must exist before anything is placed
//! in them, and subtrees can be marked read-only to simulate permission
//! failures.

use anyhow::{Context, Result, anyhow, bail};
use std::collections::{BTreeMap, HashMap};
use std::env as std_env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::path::{is_path_under, normalize_path};
use super::{CommandOutput, Runtime};

const MAX_SYMLINK_HOPS: usize = 40;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    File { data: Vec<u8>, mode: u32 },
    Dir,
    Symlink(PathBuf),
}

#[derive(Default)]
struct State {
    nodes: BTreeMap<PathBuf, Node>,
    env: HashMap<String, String>,
    outputs: HashMap<String, CommandOutput>,
    commands: Vec<(String, Vec<String>)>,
    read_only: Vec<PathBuf>,
    decline: bool,
}

#[derive(Clone)]
pub struct MemoryRuntime {
    state: Arc<Mutex<State>>,
    home: PathBuf,
    os: &'static str,
}

impl MemoryRuntime {
    /// Creates a runtime with `/` and the home directory present.
    pub fn new(home: impl Into<PathBuf>, os: &'static str) -> Self {
        let runtime = Self {
            state: Arc::new(Mutex::new(State::default())),
            home: home.into(),
            os,
        };
        runtime
            .state
            .lock()
            .unwrap()
            .nodes
            .insert(PathBuf::from("/"), Node::Dir);
        let home = runtime.home.clone();
        runtime.add_dir(&home);
        runtime
    }

    pub fn set_env(&self, key: &str, value: &str) {
        self.state
            .lock()
            .unwrap()
            .env
            .insert(key.to_string(), value.to_string());
    }

    /// Canned output for every invocation of `program`.
    pub fn set_command_output(&self, program: &str, output: CommandOutput) {
        self.state
            .lock()
            .unwrap()
            .outputs
            .insert(program.to_string(), output);
    }

    /// Answer "no" to every confirmation prompt.
    pub fn decline_prompts(&self) {
        self.state.lock().unwrap().decline = true;
    }

    /// Every mutation under `dir` fails with a permission error.
    pub fn set_read_only(&self, dir: &Path) {
        self.state
            .lock()
            .unwrap()
            .read_only
            .push(normalize_path(dir));
    }

    pub fn add_dir(&self, path: &Path) {
        let mut state = self.state.lock().unwrap();
        for ancestor in ancestors_top_down(path) {
            state.nodes.entry(ancestor).or_insert(Node::Dir);
        }
    }

    pub fn add_file(&self, path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.state.lock().unwrap().nodes.insert(
            normalize_path(path),
            Node::File {
                data: contents.as_bytes().to_vec(),
                mode: 0o644,
            },
        );
    }

    pub fn file_contents(&self, path: &Path) -> Option<String> {
        self.read_to_string(path).ok()
    }

    pub fn mode(&self, path: &Path) -> Option<u32> {
        let state = self.state.lock().unwrap();
        let resolved = resolve(&state.nodes, path, true).ok()?;
        match state.nodes.get(&resolved) {
            Some(Node::File { mode, .. }) => Some(*mode),
            _ => None,
        }
    }

    /// Copy of the whole tree, used to compare end states.
    pub fn snapshot(&self) -> BTreeMap<PathBuf, Node> {
        self.state.lock().unwrap().nodes.clone()
    }

    pub fn commands(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().unwrap().commands.clone()
    }

    fn check_writable(state: &State, path: &Path) -> Result<()> {
        if state.read_only.iter().any(|dir| is_path_under(path, dir)) {
            bail!("Permission denied: {:?}", path);
        }
        Ok(())
    }

    fn insert_file(&self, path: &Path, data: Vec<u8>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let resolved = resolve(&state.nodes, path, true)?;
        Self::check_writable(&state, &resolved)?;
        let parent = resolved
            .parent()
            .ok_or_else(|| anyhow!("No parent directory for {:?}", path))?;
        if state.nodes.get(parent) != Some(&Node::Dir) {
            bail!("No such file or directory: {:?}", parent);
        }
        let mode = match state.nodes.get(&resolved) {
            Some(Node::Dir) => bail!("Is a directory: {:?}", path),
            Some(Node::File { mode, .. }) => *mode,
            _ => 0o644,
        };
        state.nodes.insert(resolved, Node::File { data, mode });
        Ok(())
    }
}

fn ancestors_top_down(path: &Path) -> Vec<PathBuf> {
    let normalized = normalize_path(path);
    let mut ancestors: Vec<PathBuf> = normalized.ancestors().map(Path::to_path_buf).collect();
    ancestors.reverse();
    ancestors.retain(|p| !p.as_os_str().is_empty());
    ancestors
}

/// Resolves symlinks in every component; the last one only if `follow_last`.
fn resolve(nodes: &BTreeMap<PathBuf, Node>, path: &Path, follow_last: bool) -> Result<PathBuf> {
    resolve_with_hops(nodes, &normalize_path(path), follow_last, 0)
}

fn resolve_with_hops(
    nodes: &BTreeMap<PathBuf, Node>,
    path: &Path,
    follow_last: bool,
    hops: usize,
) -> Result<PathBuf> {
    if hops > MAX_SYMLINK_HOPS {
        bail!("Too many levels of symbolic links: {:?}", path);
    }
    let components: Vec<_> = path.components().collect();
    let mut current = PathBuf::new();
    for (i, component) in components.iter().enumerate() {
        let next = current.join(component);
        let is_last = i + 1 == components.len();
        match nodes.get(&next) {
            Some(Node::Symlink(target)) if !is_last || follow_last => {
                let joined = if target.is_absolute() {
                    target.clone()
                } else {
                    current.join(target)
                };
                current = resolve_with_hops(nodes, &normalize_path(&joined), true, hops + 1)?;
            }
            _ => current = next,
        }
    }
    Ok(current)
}

struct MemoryFile {
    state: Arc<Mutex<State>>,
    path: PathBuf,
    buffer: Vec<u8>,
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.nodes.insert(
            self.path.clone(),
            Node::File {
                data: self.buffer.clone(),
                mode: 0o644,
            },
        );
        Ok(())
    }
}

impl Drop for MemoryFile {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl Runtime for MemoryRuntime {
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError> {
        self.state
            .lock()
            .unwrap()
            .env
            .get(key)
            .cloned()
            .ok_or(std_env::VarError::NotPresent)
    }

    fn os(&self) -> &'static str {
        self.os
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.insert_file(path, contents.to_vec())
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let state = self.state.lock().unwrap();
        let resolved = resolve(&state.nodes, path, true)?;
        match state.nodes.get(&resolved) {
            Some(Node::File { data, .. }) => Ok(data.clone()),
            Some(_) => bail!("Not a file: {:?}", path),
            None => bail!("No such file or directory: {:?}", path),
        }
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let data = self.read(path)?;
        String::from_utf8(data).with_context(|| format!("{:?} is not valid UTF-8", path))
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        let data = self.read(from)?;
        let mode = self.mode(from).unwrap_or(0o644);
        let len = data.len() as u64;
        self.insert_file(to, data)?;
        self.set_permissions(to, mode)?;
        Ok(len)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for ancestor in ancestors_top_down(path) {
            let resolved = resolve(&state.nodes, &ancestor, true)?;
            match state.nodes.get(&resolved) {
                Some(Node::Dir) => {}
                Some(_) => bail!("Not a directory: {:?}", ancestor),
                None => {
                    Self::check_writable(&state, &resolved)?;
                    state.nodes.insert(resolved, Node::Dir);
                }
            }
        }
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let resolved = resolve(&state.nodes, path, false)?;
        match state.nodes.get(&resolved) {
            Some(Node::Dir) => bail!("Is a directory: {:?}", path),
            Some(_) => {
                Self::check_writable(&state, &resolved)?;
                state.nodes.remove(&resolved);
                Ok(())
            }
            None => bail!("No such file or directory: {:?}", path),
        }
    }

    fn remove_dir(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let resolved = resolve(&state.nodes, path, false)?;
        if state.nodes.get(&resolved) != Some(&Node::Dir) {
            bail!("Not a directory: {:?}", path);
        }
        if state
            .nodes
            .keys()
            .any(|k| k.parent() == Some(resolved.as_path()))
        {
            bail!("Directory not empty: {:?}", path);
        }
        Self::check_writable(&state, &resolved)?;
        state.nodes.remove(&resolved);
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let resolved = resolve(&state.nodes, path, false)?;
        if state.nodes.get(&resolved) != Some(&Node::Dir) {
            bail!("Not a directory: {:?}", path);
        }
        Self::check_writable(&state, &resolved)?;
        state
            .nodes
            .retain(|k, _| !(k == &resolved || k.starts_with(&resolved)));
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let state = self.state.lock().unwrap();
        resolve(&state.nodes, path, true)
            .map(|p| state.nodes.contains_key(&p))
            .unwrap_or(false)
    }

    fn is_dir(&self, path: &Path) -> bool {
        let state = self.state.lock().unwrap();
        resolve(&state.nodes, path, true)
            .map(|p| state.nodes.get(&p) == Some(&Node::Dir))
            .unwrap_or(false)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let state = self.state.lock().unwrap();
        let resolved = resolve(&state.nodes, path, true)?;
        if state.nodes.get(&resolved) != Some(&Node::Dir) {
            bail!("Not a directory: {:?}", path);
        }
        Ok(state
            .nodes
            .keys()
            .filter(|k| k.parent() == Some(resolved.as_path()))
            .filter_map(|k| k.file_name().map(|name| path.join(name)))
            .collect())
    }

    fn create_file(&self, path: &Path) -> Result<Box<dyn Write + Send>> {
        self.insert_file(path, Vec::new())?;
        let resolved = {
            let state = self.state.lock().unwrap();
            resolve(&state.nodes, path, true)?
        };
        Ok(Box::new(MemoryFile {
            state: Arc::clone(&self.state),
            path: resolved,
            buffer: Vec::new(),
        }))
    }

    fn set_permissions(&self, path: &Path, new_mode: u32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let resolved = resolve(&state.nodes, path, true)?;
        match state.nodes.get_mut(&resolved) {
            Some(Node::File { mode, .. }) => {
                *mode = new_mode;
                Ok(())
            }
            Some(_) => Ok(()),
            None => bail!("No such file or directory: {:?}", path),
        }
    }

    fn symlink(&self, original: &Path, link: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let resolved = resolve(&state.nodes, link, false)?;
        let parent = resolved
            .parent()
            .ok_or_else(|| anyhow!("No parent directory for {:?}", link))?;
        if state.nodes.get(parent) != Some(&Node::Dir) {
            bail!("Failed to create symlink {:?}: parent does not exist", link);
        }
        if state.nodes.contains_key(&resolved) {
            bail!("Failed to create symlink {:?}: file exists", link);
        }
        Self::check_writable(&state, &resolved)
            .with_context(|| format!("Failed to create symlink {:?}", link))?;
        state
            .nodes
            .insert(resolved, Node::Symlink(original.to_path_buf()));
        Ok(())
    }

    fn read_link(&self, path: &Path) -> Result<PathBuf> {
        let state = self.state.lock().unwrap();
        let resolved = resolve(&state.nodes, path, false)?;
        match state.nodes.get(&resolved) {
            Some(Node::Symlink(target)) => Ok(target.clone()),
            _ => bail!("Not a symlink: {:?}", path),
        }
    }

    fn is_symlink(&self, path: &Path) -> bool {
        let state = self.state.lock().unwrap();
        resolve(&state.nodes, path, false)
            .map(|p| matches!(state.nodes.get(&p), Some(Node::Symlink(_))))
            .unwrap_or(false)
    }

    fn remove_symlink(&self, path: &Path) -> Result<()> {
        if !self.is_symlink(path) {
            bail!("Not a symlink: {:?}", path);
        }
        self.remove_file(path)
    }

    fn run_command(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        self.run_command_with_env(program, args, &[])
    }

    fn run_command_with_env(
        &self,
        program: &str,
        args: &[String],
        _env: &[(String, String)],
    ) -> Result<CommandOutput> {
        let mut state = self.state.lock().unwrap();
        state
            .commands
            .push((program.to_string(), args.to_vec()));
        Ok(state
            .outputs
            .get(program)
            .cloned()
            .unwrap_or_else(|| CommandOutput::ok("")))
    }

    fn home_dir(&self) -> Option<PathBuf> {
        Some(self.home.clone())
    }

    fn is_privileged(&self) -> bool {
        false
    }

    fn confirm(&self, _prompt: &str) -> Result<bool> {
        Ok(!self.state.lock().unwrap().decline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime() -> MemoryRuntime {
        MemoryRuntime::new("/home/user", "linux")
    }

    #[test]
    fn test_write_requires_parent() {
        let rt = runtime();
        assert!(rt.write(Path::new("/opt/x/file"), b"x").is_err());
        rt.create_dir_all(Path::new("/opt/x")).unwrap();
        rt.write(Path::new("/opt/x/file"), b"x").unwrap();
        assert_eq!(rt.file_contents(Path::new("/opt/x/file")).unwrap(), "x");
    }

    #[test]
    fn test_symlink_resolution() {
        let rt = runtime();
        rt.add_file(Path::new("/prefix/Cellar/pkg/1.0/bin/tool"), "bin");
        rt.add_dir(Path::new("/prefix/opt"));
        rt.symlink(Path::new("../Cellar/pkg/1.0"), Path::new("/prefix/opt/pkg"))
            .unwrap();

        assert!(rt.is_symlink(Path::new("/prefix/opt/pkg")));
        assert!(rt.is_dir(Path::new("/prefix/opt/pkg")));
        assert_eq!(
            rt.file_contents(Path::new("/prefix/opt/pkg/bin/tool")).unwrap(),
            "bin"
        );
        assert_eq!(
            rt.read_dir(Path::new("/prefix/opt/pkg/bin")).unwrap(),
            vec![PathBuf::from("/prefix/opt/pkg/bin/tool")]
        );
    }

    #[test]
    fn test_dangling_symlink() {
        let rt = runtime();
        rt.add_dir(Path::new("/bin"));
        rt.symlink(Path::new("/missing"), Path::new("/bin/link")).unwrap();
        assert!(!rt.exists(Path::new("/bin/link")));
        assert!(rt.is_symlink(Path::new("/bin/link")));
        assert!(rt.symlink(Path::new("/other"), Path::new("/bin/link")).is_err());
        rt.remove_symlink(Path::new("/bin/link")).unwrap();
        assert!(!rt.is_symlink(Path::new("/bin/link")));
    }

    #[test]
    fn test_read_only_subtree() {
        let rt = runtime();
        rt.add_dir(Path::new("/usr/local/bin"));
        rt.set_read_only(Path::new("/usr/local/bin"));
        let err = rt
            .symlink(Path::new("/x"), Path::new("/usr/local/bin/x"))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Permission denied"));
    }

    #[test]
    fn test_remove_dir_all_and_create_file() {
        let rt = runtime();
        rt.add_file(Path::new("/a/b/c.txt"), "c");
        {
            let mut writer = rt.create_file(Path::new("/a/d.txt")).unwrap();
            writer.write_all(b"streamed").unwrap();
        }
        assert_eq!(rt.file_contents(Path::new("/a/d.txt")).unwrap(), "streamed");

        rt.remove_dir_all(Path::new("/a")).unwrap();
        assert!(!rt.exists(Path::new("/a/b/c.txt")));
        assert!(!rt.exists(Path::new("/a")));
    }

    #[test]
    fn test_commands_are_recorded() {
        let rt = runtime();
        rt.set_command_output("launchctl", CommandOutput::failed("not loaded"));
        let out = rt
            .run_command("launchctl", &["remove".to_string(), "x".to_string()])
            .unwrap();
        assert!(!out.success);
        assert_eq!(rt.commands()[0].0, "launchctl");
    }
}

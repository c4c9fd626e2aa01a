use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    sync::OnceLock,
};
use tempfile::TempDir;

/// Shell scripts standing in for the wrapped binary, the MPI launcher and `scontrol`
///
/// They are all written once, before any test spawns a process, so no child can inherit a
/// script opened for writing.
pub struct Fixtures {
    dir: TempDir,
}

const APP: &str = r#"case "$*" in
  *write_score*)
    while [ $# -gt 0 ]; do
      if [ "$1" = "-out:path:score" ]; then
        printf 'SEQUENCE:\nSCORE: total_score description\nSCORE: -12.5 decoy_0001\n' > "$2/decoy.sc"
      fi
      shift
    done ;;
  *fail*) echo "stdout before failure"; echo "broken input" >&2; exit 3 ;;
  *hang*) sleep 5 ;;
  *pwd*) pwd ;;
  *) echo "args: $*" ;;
esac"#;

const ECHO_LAUNCHER: &str = r#"echo "launcher: $*""#;

// `--hostfile <path> ...`
const HOST_FILE_LAUNCHER: &str = r#"cat "$2"
echo "launcher: $*""#;

const FAILING_LAUNCHER: &str = r#"echo "launcher failed"
exit 7"#;

const SCONTROL: &str = r#"printf 'node01\nnode02\n'"#;

const FAILING_SCONTROL: &str = r#"echo "invalid node list" >&2
exit 1"#;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

    path
}

impl Fixtures {
    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn app(&self) -> PathBuf {
        self.path("app")
    }

    pub fn echo_launcher(&self) -> PathBuf {
        self.path("echo_launcher")
    }

    pub fn host_file_launcher(&self) -> PathBuf {
        self.path("host_file_launcher")
    }

    pub fn failing_launcher(&self) -> PathBuf {
        self.path("failing_launcher")
    }

    pub fn scontrol(&self) -> PathBuf {
        self.path("scontrol")
    }

    pub fn failing_scontrol(&self) -> PathBuf {
        self.path("failing_scontrol")
    }
}

pub fn fixtures() -> &'static Fixtures {
    static FIXTURES: OnceLock<Fixtures> = OnceLock::new();

    FIXTURES.get_or_init(|| {
        let dir = TempDir::new().unwrap();

        for (name, body) in [
            ("app", APP),
            ("echo_launcher", ECHO_LAUNCHER),
            ("host_file_launcher", HOST_FILE_LAUNCHER),
            ("failing_launcher", FAILING_LAUNCHER),
            ("scontrol", SCONTROL),
            ("failing_scontrol", FAILING_SCONTROL),
        ] {
            write_script(dir.path(), name, body);
        }

        Fixtures { dir }
    })
}

/// names of all host files left in `dir`
pub fn host_files(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("nodefile_"))
        .collect()
}

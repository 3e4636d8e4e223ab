//! End-to-end loading of realistic lockfile documents.

use lockprobe_core::{Source, diff};
use lockprobe_lockfile::parse_lockfile;

const UV_LOCK: &str = r#"
version = 1
revision = 2
requires-python = ">=3.12"

[options]
exclude-newer = "2024-11-01T00:00:00Z"

[[package]]
name = "anyio"
version = "4.6.2"
source = { registry = "https://pypi.org/simple" }
dependencies = [
    { name = "idna" },
    { name = "sniffio" },
]

[[package]]
name = "idna"
version = "3.10"
source = { registry = "https://pypi.org/simple" }

[[package]]
name = "sniffio"
version = "1.3.1"
source = { registry = "https://pypi.org/simple" }

[[package]]
name = "my-project"
source = { editable = "." }
dependencies = [{ name = "anyio" }]

[[package]]
name = "mylib"
version = "0.3.0"
source = { git = "https://example.com/mylib.git?rev=main#abcdef0" }
"#;

const POETRY_LOCK: &str = r#"
[[package]]
name = "anyio"
version = "4.7.0"
description = "High level compatibility layer"
optional = false
python-versions = ">=3.9"
files = []

[[package]]
name = "idna"
version = "3.10"
description = ""
optional = false
python-versions = ">=3.6"
files = []

[[package]]
name = "sniffio"
version = "1.3.1"
description = ""
optional = false
python-versions = ">=3.7"
files = []

[package.source]
type = "legacy"
url = "https://mirror.example.com/simple"
reference = "mirror"

[[package]]
name = "mylib"
version = "0.3.0"
description = ""
optional = false
python-versions = "*"
files = []

[package.source]
type = "git"
url = "https://example.com/mylib.git"
reference = "main"
resolved_reference = "abcdef0"

[metadata]
lock-version = "2.1"
python-versions = ">=3.12"
content-hash = "0000"
"#;

#[test]
fn test_load_uv_lockfile() {
    let lockfile = parse_lockfile(UV_LOCK).unwrap();
    assert_eq!(lockfile.len(), 5);

    assert_eq!(lockfile.get("anyio").unwrap().version.raw(), "4.6.2");
    assert_eq!(lockfile.get("anyio").unwrap().source, Source::PyPI);

    let project = lockfile.get("my-project").unwrap();
    assert_eq!(project.version.raw(), "0+undefined");
    assert_eq!(
        project.source,
        Source::Direct {
            location: ".".into(),
            subdirectory: None
        }
    );

    assert_eq!(
        lockfile.get("mylib").unwrap().source,
        Source::Direct {
            location: "git+https://example.com/mylib.git@abcdef0".into(),
            subdirectory: None
        }
    );
}

#[test]
fn test_load_poetry_lockfile() {
    let lockfile = parse_lockfile(POETRY_LOCK).unwrap();
    assert_eq!(lockfile.len(), 4);

    assert_eq!(lockfile.get("anyio").unwrap().source, Source::DefaultRegistry);
    assert_eq!(
        lockfile.get("sniffio").unwrap().source,
        Source::Registry {
            url: "https://mirror.example.com/simple".into()
        }
    );
    assert_eq!(
        lockfile.get("mylib").unwrap().source,
        Source::Direct {
            location: "git+https://example.com/mylib.git@abcdef0".into(),
            subdirectory: None
        }
    );
}

#[test]
fn test_cross_flavor_diff() {
    let old = parse_lockfile(UV_LOCK).unwrap();
    let new = parse_lockfile(POETRY_LOCK).unwrap();
    let result = diff(&old, &new);

    // anyio: 4.6.2 -> 4.7.0, same effective source on both sides is not
    // guaranteed (uv says pypi, poetry says default), so it is updated.
    let anyio = &result.packages["anyio"];
    assert!(!anyio.is_major_change);
    assert!(anyio.is_source_change);

    // mylib resolved to the same pip-style VCS URL in both flavors.
    assert!(!result.packages.contains_key("mylib"));

    // my-project only exists in the uv lockfile.
    assert!(result.packages["my-project"].new.is_none());

    // idna is identical in version; source flips pypi -> default.
    assert!(result.packages["idna"].is_source_change);

    assert_eq!(result.stat.removed, 1);
    assert_eq!(result.stat.added, 0);
}

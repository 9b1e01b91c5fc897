/// Split an image reference into `(repository, tag)`.
///
/// Per spec.md §3: split on the **last** `:` only when that `:` appears
/// after the **last** `/` — a registry port's colon (`host:5000/repo`) does
/// not count as a tag separator. When no qualifying `:` is present the tag
/// defaults to `"latest"`.
pub fn split_reference(image_reference: &str) -> (String, String) {
    let last_slash = image_reference.rfind('/');
    let last_colon = image_reference.rfind(':');

    match last_colon {
        Some(colon) if last_slash.is_none_or(|slash| colon > slash) => {
            let repository = image_reference[..colon].to_string();
            let tag = image_reference[colon + 1..].to_string();
            if tag.is_empty() {
                (image_reference.trim_end_matches(':').to_string(), "latest".to_string())
            } else {
                (repository, tag)
            }
        }
        _ => (image_reference.to_string(), "latest".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_port_without_tag() {
        assert_eq!(
            split_reference("registry.example.com:5000/path/image"),
            ("registry.example.com:5000/path/image".to_string(), "latest".to_string())
        );
    }

    #[test]
    fn host_port_with_tag() {
        assert_eq!(
            split_reference("registry.example.com:5000/path/image:1.2.3"),
            ("registry.example.com:5000/path/image".to_string(), "1.2.3".to_string())
        );
    }

    #[test]
    fn no_registry_no_tag() {
        assert_eq!(split_reference("nginx"), ("nginx".to_string(), "latest".to_string()));
    }

    #[test]
    fn no_registry_with_tag() {
        assert_eq!(
            split_reference("nginx:1.25.0"),
            ("nginx".to_string(), "1.25.0".to_string())
        );
    }

    #[test]
    fn multi_segment_path_with_tag() {
        assert_eq!(
            split_reference("ghcr.io/org/repo/image:v2"),
            ("ghcr.io/org/repo/image".to_string(), "v2".to_string())
        );
    }

    #[test]
    fn round_trips_through_rejoin() {
        for reference in [
            "nginx",
            "nginx:latest",
            "library/nginx:1.25.0",
            "registry.example.com:5000/path/image:1.2.3",
            "localhost:5000/image",
        ] {
            let (repository, tag) = split_reference(reference);
            let rejoined = format!("{repository}:{tag}");
            let (repository2, tag2) = split_reference(&rejoined);
            assert_eq!(repository, repository2);
            assert_eq!(tag, tag2);
        }
    }
}

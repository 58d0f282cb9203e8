//! Known language server configurations, keyed by a short server key
//! (`"rust"`, `"typescript"`, ...) rather than by executable name, since
//! several keys can share overlapping file extensions at different
//! priorities (eslint layers on top of typescript, for instance).

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub key: &'static str,
    pub name: &'static str,
    pub command: &'static [&'static str],
    pub file_extensions: &'static [&'static str],
    /// Higher priority servers are tried first for a given extension.
    pub priority: i32,
}

pub const SERVERS: &[ServerConfig] = &[
    ServerConfig { key: "python", name: "pylsp", command: &["pylsp"], file_extensions: &[".py", ".pyi"], priority: 0 },
    ServerConfig { key: "typescript", name: "typescript-language-server", command: &["typescript-language-server", "--stdio"], file_extensions: &[".ts", ".tsx", ".js", ".jsx"], priority: 0 },
    ServerConfig { key: "rust", name: "rust-analyzer", command: &["rust-analyzer"], file_extensions: &[".rs"], priority: 0 },
    ServerConfig { key: "go", name: "gopls", command: &["gopls", "serve"], file_extensions: &[".go"], priority: 0 },
    ServerConfig { key: "eslint", name: "vscode-eslint-language-server", command: &["vscode-eslint-language-server", "--stdio"], file_extensions: &[".ts", ".tsx", ".js", ".jsx", ".vue", ".svelte"], priority: 10 },
    ServerConfig { key: "vue", name: "vue-language-server", command: &["vue-language-server", "--stdio"], file_extensions: &[".vue"], priority: 0 },
    ServerConfig { key: "svelte", name: "svelteserver", command: &["svelteserver", "--stdio"], file_extensions: &[".svelte"], priority: 0 },
    ServerConfig { key: "clangd", name: "clangd", command: &["clangd"], file_extensions: &[".c", ".h", ".cpp", ".cc", ".cxx", ".hpp", ".hh"], priority: 0 },
    ServerConfig { key: "html", name: "vscode-html-language-server", command: &["vscode-html-language-server", "--stdio"], file_extensions: &[".html", ".htm"], priority: 0 },
    ServerConfig { key: "css", name: "vscode-css-language-server", command: &["vscode-css-language-server", "--stdio"], file_extensions: &[".css", ".scss", ".less"], priority: 0 },
    ServerConfig { key: "json", name: "vscode-json-language-server", command: &["vscode-json-language-server", "--stdio"], file_extensions: &[".json", ".jsonc"], priority: 0 },
    ServerConfig { key: "yaml", name: "yaml-language-server", command: &["yaml-language-server", "--stdio"], file_extensions: &[".yaml", ".yml"], priority: 0 },
    ServerConfig { key: "bash", name: "bash-language-server", command: &["bash-language-server", "start"], file_extensions: &[".sh", ".bash"], priority: 0 },
    ServerConfig { key: "lua", name: "lua-language-server", command: &["lua-language-server"], file_extensions: &[".lua"], priority: 0 },
    ServerConfig { key: "zig", name: "zls", command: &["zls"], file_extensions: &[".zig"], priority: 0 },
    ServerConfig { key: "java", name: "jdtls", command: &["jdtls"], file_extensions: &[".java"], priority: 0 },
    ServerConfig { key: "ruby", name: "solargraph", command: &["solargraph", "stdio"], file_extensions: &[".rb"], priority: 0 },
];

/// Language ID as used in `textDocument/didOpen`, distinct from `SERVERS`
/// keys because e.g. `.tsx` is its own language id but shares a server.
pub fn language_id(path: &str) -> &'static str {
    let ext_map: &[(&str, &str)] = &[
        (".py", "python"), (".pyi", "python"),
        (".ts", "typescript"), (".tsx", "typescriptreact"),
        (".js", "javascript"), (".jsx", "javascriptreact"),
        (".rs", "rust"), (".go", "go"),
        (".vue", "vue"), (".svelte", "svelte"),
        (".c", "c"), (".h", "c"),
        (".cpp", "cpp"), (".cc", "cpp"), (".cxx", "cpp"), (".hpp", "cpp"), (".hh", "cpp"),
        (".html", "html"), (".htm", "html"),
        (".css", "css"), (".scss", "scss"), (".less", "less"),
        (".json", "json"), (".jsonc", "jsonc"),
        (".yaml", "yaml"), (".yml", "yaml"),
        (".sh", "shellscript"), (".bash", "shellscript"),
        (".lua", "lua"), (".zig", "zig"), (".java", "java"), (".rb", "ruby"),
    ];
    for (ext, lang) in ext_map {
        if path.ends_with(ext) {
            return lang;
        }
    }
    "plaintext"
}

/// Server keys that handle `path`, sorted by ascending priority (lowest
/// tried first, matching the original implementation's ordering).
pub fn servers_for_file(path: &str) -> Vec<&'static str> {
    let mut matching: Vec<(i32, &'static str)> = SERVERS
        .iter()
        .filter(|s| s.file_extensions.iter().any(|ext| path.ends_with(ext)))
        .map(|s| (s.priority, s.key))
        .collect();
    matching.sort_by_key(|(priority, _)| *priority);
    matching.into_iter().map(|(_, key)| key).collect()
}

pub fn server_config(key: &str) -> Option<&'static ServerConfig> {
    SERVERS.iter().find(|s| s.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typescript_file_matches_eslint_and_typescript() {
        let keys = servers_for_file("src/app.tsx");
        assert!(keys.contains(&"typescript"));
        assert!(keys.contains(&"eslint"));
        assert_eq!(keys.last(), Some(&"eslint"));
    }

    #[test]
    fn rust_file_matches_only_rust_analyzer() {
        assert_eq!(servers_for_file("src/main.rs"), vec!["rust"]);
    }

    #[test]
    fn unknown_extension_has_no_servers() {
        assert!(servers_for_file("README.xyz").is_empty());
    }

    #[test]
    fn language_id_maps_known_and_unknown_extensions() {
        assert_eq!(language_id("a.rs"), "rust");
        assert_eq!(language_id("a.tsx"), "typescriptreact");
        assert_eq!(language_id("a.unknown"), "plaintext");
    }
}

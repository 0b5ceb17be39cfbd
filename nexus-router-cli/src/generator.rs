//! Registration table generator.
//!
//! Turns discovered collections into a Rust module that registers every
//! handler through `CollectionBuilder`, so a host crate can serve the scanned
//! procedures without loading anything at runtime.

use crate::config::CodegenConfig;
use crate::error::{CliResult, GenerateError};
use nexus_router::{HandlerRef, ProcedureCollection, ProcedureDef, ProcedureKind, compile};

/// Generated registration module.
#[derive(Debug, Clone)]
pub struct GeneratedTable {
    /// Complete Rust source.
    pub content: String,

    /// Number of collections registered.
    pub collections: usize,

    /// Number of procedures registered.
    pub procedures: usize,
}

/// Emits the static registration table.
pub struct RegistrationGenerator {
    config: CodegenConfig,
}

impl RegistrationGenerator {
    /// Create a new generator with the given configuration.
    pub fn new(config: CodegenConfig) -> Self {
        Self { config }
    }

    /// Generate the registration module for `collections`.
    ///
    /// Refuses input that would compile into a rejected router, so the
    /// generated table never fails at startup with a conflict.
    pub fn generate(
        &self,
        collections: &[ProcedureCollection<HandlerRef>],
    ) -> CliResult<GeneratedTable> {
        if collections.is_empty() {
            return Err(GenerateError::NothingToGenerate.into());
        }
        compile(collections.to_vec()).ensure_accepted()?;

        check_path("crate_path", &self.config.crate_path)?;
        check_path("module_root", &self.config.module_root)?;
        syn::parse_str::<syn::Type>(&self.config.context_type).map_err(|e| {
            GenerateError::invalid_syntax("context_type", &self.config.context_type, e.to_string())
        })?;

        let mut body = String::new();
        let mut procedures = 0;
        for collection in collections {
            body.push_str(&self.generate_collection(collection)?);
            procedures += collection.len();
        }

        Ok(GeneratedTable {
            content: self.generate_output(&body),
            collections: collections.len(),
            procedures,
        })
    }

    fn generate_collection(&self, collection: &ProcedureCollection<HandlerRef>) -> CliResult<String> {
        let mut out = format!(
            "        CollectionBuilder::<Ctx>::new({:?})\n            .source({:?})\n",
            collection.namespace, collection.source
        );
        for procedure in &collection.procedures {
            out.push_str(&self.generate_procedure(procedure)?);
        }
        out.push_str("            .build()?,\n");
        Ok(out)
    }

    fn generate_procedure(&self, procedure: &ProcedureDef<HandlerRef>) -> CliResult<String> {
        let handler = procedure.handler.rust_path(&self.config.module_root);
        check_path("handler path", &handler)?;

        let mut out = format!("            .procedure({:?})\n", procedure.name);
        if let Some(meta) = &procedure.transport {
            out.push_str(&format!(
                "            .{}({:?})\n",
                meta.method.as_str().to_ascii_lowercase(),
                meta.path.to_string()
            ));
        }
        if procedure.handler.validated {
            out.push_str("            .validated()\n");
        }
        let register = match procedure.kind {
            ProcedureKind::Query => "query",
            ProcedureKind::Mutation => "mutation",
        };
        out.push_str(&format!("            .{}({})\n", register, handler));
        Ok(out)
    }

    fn generate_output(&self, body: &str) -> String {
        let krate = &self.config.crate_path;
        let mut out = String::new();
        out.push_str("// @generated by nexus-router. Do not edit.\n");
        out.push_str("// Regenerate with `nexus-router generate`.\n\n");
        out.push_str(&format!(
            "use {}::{{BoxedHandler, CollectionBuilder, InvalidExport, ProcedureCollection}};\n\n",
            krate
        ));
        out.push_str(&format!("type Ctx = {};\n\n", self.config.context_type));
        out.push_str("/// Every discovered procedure collection, in discovery order.\n");
        out.push_str(
            "pub fn collections() -> Result<Vec<ProcedureCollection<BoxedHandler<Ctx>>>, InvalidExport> {\n",
        );
        out.push_str("    Ok(vec![\n");
        out.push_str(body);
        out.push_str("    ])\n}\n");
        out
    }
}

fn check_path(key: &'static str, value: &str) -> Result<(), GenerateError> {
    syn::parse_str::<syn::Path>(value)
        .map(drop)
        .map_err(|e| GenerateError::invalid_syntax(key, value, e.to_string()))
}

//! Registry of worker functions and named structs, organised as a namespace tree.

use super::{FunctionCall, FunctionHandler, HandlerFuture};
use crate::error::WorkerError;
use crate::grpc::proto::signature as ps;
use crate::model::{
    GraphType, NamedStructs, Row, StructValue, TierkreisFunction, TierkreisType, TypeScheme,
};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Declared ports and documentation of a function, before registration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FunctionDeclaration {
    inputs: Row,
    outputs: Row,
    input_order: Vec<String>,
    output_order: Vec<String>,
    variables: Vec<String>,
    docs: String,
}

impl FunctionDeclaration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, name: impl Into<String>, input_type: TierkreisType) -> Self {
        let name = name.into();
        if self.inputs.insert(name.clone(), input_type).is_none() {
            self.input_order.push(name);
        }
        self
    }

    pub fn with_output(mut self, name: impl Into<String>, output_type: TierkreisType) -> Self {
        let name = name.into();
        if self.outputs.insert(name.clone(), output_type).is_none() {
            self.output_order.push(name);
        }
        self
    }

    /// Bind a type variable, making the function polymorphic.
    pub fn with_variable(mut self, name: impl Into<String>) -> Self {
        self.variables.push(name.into());
        self
    }

    pub fn with_docs(mut self, docs: impl Into<String>) -> Self {
        self.docs = docs.into();
        self
    }

    fn type_scheme(&self) -> TypeScheme {
        TypeScheme::new(
            self.variables.clone(),
            TierkreisType::Graph(GraphType {
                inputs: self.inputs.clone(),
                outputs: self.outputs.clone(),
            }),
        )
    }
}

/// A function with its declared type and implementation.
#[derive(Clone)]
pub struct RegisteredFunction {
    function: TierkreisFunction,
    inputs: Row,
    outputs: Row,
    handler: FunctionHandler,
}

impl RegisteredFunction {
    pub fn function(&self) -> &TierkreisFunction {
        &self.function
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Check `inputs` against the declared input row.
    pub fn check_inputs(&self, inputs: &StructValue, structs: &NamedStructs) -> Result<(), WorkerError> {
        inputs
            .check_row(&self.inputs, structs)
            .map_err(|source| WorkerError::InvalidInput {
                function: self.function.name.clone(),
                source,
            })
    }

    pub fn check_outputs(&self, outputs: &StructValue, structs: &NamedStructs) -> Result<(), WorkerError> {
        outputs
            .check_row(&self.outputs, structs)
            .map_err(|source| WorkerError::InvalidOutput {
                function: self.function.name.clone(),
                source,
            })
    }

    pub fn run(&self, call: FunctionCall) -> HandlerFuture {
        (self.handler)(call)
    }
}

impl fmt::Debug for RegisteredFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredFunction")
            .field("function", &self.function)
            .finish()
    }
}

/// A named group of functions and structs.
///
/// The root namespace has an empty name; `sub` creates nested ones whose
/// members are published as `name/member`.
#[derive(Default)]
pub struct Namespace {
    path: Vec<String>,
    functions: BTreeMap<String, RegisteredFunction>,
    structs: BTreeMap<String, Row>,
    subspaces: BTreeMap<String, Namespace>,
}

impl Namespace {
    /// Create the root namespace
    pub fn new() -> Self {
        Self::default()
    }

    /// `/`-joined path of this namespace, empty for the root.
    pub fn name(&self) -> String {
        self.path.join("/")
    }

    /// Get or create the child namespace `name`.
    pub fn sub(&mut self, name: &str) -> &mut Namespace {
        let path = &self.path;
        self.subspaces
            .entry(name.to_string())
            .or_insert_with(|| {
                let mut path = path.clone();
                path.push(name.to_string());
                Namespace {
                    path,
                    ..Namespace::default()
                }
            })
    }

    fn qualify(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.name(), name)
        }
    }

    /// Register a function implemented by an async closure.
    pub fn add_function<F, Fut>(
        &mut self,
        name: &str,
        declaration: FunctionDeclaration,
        handler: F,
    ) -> Result<(), WorkerError>
    where
        F: Fn(FunctionCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StructValue, WorkerError>> + Send + 'static,
    {
        let handler: FunctionHandler =
            Arc::new(move |call: FunctionCall| -> HandlerFuture { Box::pin(handler(call)) });
        self.add_handler(name, declaration, handler)
    }

    /// Register an already type-erased handler.
    pub fn add_handler(
        &mut self,
        name: &str,
        declaration: FunctionDeclaration,
        handler: FunctionHandler,
    ) -> Result<(), WorkerError> {
        let qualified = self.qualify(name);
        if self.functions.contains_key(name) {
            return Err(WorkerError::AlreadyRegistered(qualified));
        }

        let function = TierkreisFunction {
            name: qualified,
            type_scheme: declaration.type_scheme(),
            docs: declaration.docs,
            input_order: declaration.input_order,
            output_order: declaration.output_order,
        };
        self.functions.insert(
            name.to_string(),
            RegisteredFunction {
                function,
                inputs: declaration.inputs,
                outputs: declaration.outputs,
                handler,
            },
        );
        Ok(())
    }

    /// Register a named struct, returning the alias type that refers to it.
    pub fn add_named_struct(&mut self, name: &str, fields: Row) -> Result<TierkreisType, WorkerError> {
        let qualified = self.qualify(name);
        if self.structs.contains_key(name) {
            return Err(WorkerError::AlreadyRegistered(qualified));
        }
        self.structs.insert(name.to_string(), fields);
        Ok(TierkreisType::Alias(qualified))
    }

    /// Look up a function by qualified name, e.g. `pytket/compile_circuits`.
    pub fn get_function(&self, qualified: &str) -> Option<&RegisteredFunction> {
        if let Some(function) = self.functions.get(qualified) {
            return Some(function);
        }
        let (child, rest) = qualified.split_once('/')?;
        self.subspaces.get(child)?.get_function(rest)
    }

    /// Every function in this namespace and below
    pub fn functions(&self) -> Vec<&RegisteredFunction> {
        let mut functions: Vec<_> = self.functions.values().collect();
        for subspace in self.subspaces.values() {
            functions.extend(subspace.functions());
        }
        functions
    }

    /// Every struct in this namespace and below, by qualified name.
    pub fn named_structs(&self) -> NamedStructs {
        let mut structs = NamedStructs::new();
        for (name, row) in &self.structs {
            structs.register(self.qualify(name), row.clone());
        }
        for subspace in self.subspaces.values() {
            structs.extend(subspace.named_structs());
        }
        structs
    }

    /// Catalog of this namespace tree in the form the runtime publishes its own.
    pub fn signature(&self) -> ps::ListFunctionsResponse {
        let functions = self
            .functions()
            .into_iter()
            .map(|registered| (registered.function.name.clone(), registered.function.to_proto()))
            .collect();
        let aliases = self
            .named_structs()
            .iter()
            .map(|(name, row)| {
                let scheme = TypeScheme::monomorphic(TierkreisType::Struct(row.clone()));
                (name.clone(), scheme.to_proto())
            })
            .collect();
        ps::ListFunctionsResponse { functions, aliases }
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name())
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("structs", &self.structs.keys().collect::<Vec<_>>())
            .field("subspaces", &self.subspaces)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::signature_from_proto;
    use crate::model::TierkreisValue;

    fn angle_declaration() -> FunctionDeclaration {
        FunctionDeclaration::new()
            .with_input("angle", TierkreisType::Float)
            .with_output("result", TierkreisType::Float)
            .with_docs("double an angle")
    }

    async fn double(call: FunctionCall) -> Result<StructValue, WorkerError> {
        let angle = call
            .inputs
            .get("angle")
            .and_then(TierkreisValue::as_float)
            .ok_or_else(|| WorkerError::Failed("angle must be a float".to_string()))?;
        let mut outputs = StructValue::default();
        outputs.insert("result", TierkreisValue::Float(angle * 2.0));
        Ok(outputs)
    }

    #[test]
    fn test_qualified_names() {
        let mut root = Namespace::new();
        root.sub("pytket")
            .add_function("double", angle_declaration(), double)
            .unwrap();
        root.add_function("id", angle_declaration(), double).unwrap();

        assert_eq!(root.get_function("pytket/double").unwrap().name(), "pytket/double");
        assert_eq!(root.get_function("id").unwrap().name(), "id");
        assert!(root.get_function("pytket/missing").is_none());
        assert!(root.get_function("double").is_none());
        assert_eq!(root.functions().len(), 2);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut root = Namespace::new();
        let pytket = root.sub("pytket");
        pytket.add_function("double", angle_declaration(), double).unwrap();
        let err = pytket
            .add_function("double", angle_declaration(), double)
            .unwrap_err();
        assert!(matches!(err, WorkerError::AlreadyRegistered(name) if name == "pytket/double"));
    }

    #[test]
    fn test_named_struct_alias() {
        let mut root = Namespace::new();
        let mut fields = Row::new();
        fields.insert("shots".to_string(), TierkreisType::Int);
        let alias = root.sub("pytket").add_named_struct("Backend", fields.clone()).unwrap();

        assert_eq!(alias, TierkreisType::Alias("pytket/Backend".to_string()));
        assert_eq!(root.named_structs().get("pytket/Backend"), Some(&fields));
        assert!(root.sub("pytket").add_named_struct("Backend", Row::new()).is_err());
    }

    #[test]
    fn test_input_check_uses_declared_row() {
        let mut root = Namespace::new();
        root.add_function("double", angle_declaration(), double).unwrap();
        let function = root.get_function("double").unwrap();
        let structs = root.named_structs();

        let mut good = StructValue::default();
        good.insert("angle", TierkreisValue::Float(0.5));
        assert!(function.check_inputs(&good, &structs).is_ok());

        let mut bad = StructValue::default();
        bad.insert("angle", TierkreisValue::Str("half".to_string()));
        assert!(matches!(
            function.check_inputs(&bad, &structs),
            Err(WorkerError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_registered_function() {
        let mut root = Namespace::new();
        root.add_function("double", angle_declaration(), double).unwrap();

        let mut inputs = StructValue::default();
        inputs.insert("angle", TierkreisValue::Float(1.5));
        let outputs = root
            .get_function("double")
            .unwrap()
            .run(FunctionCall {
                function: "double".to_string(),
                inputs,
                callback: None,
            })
            .await
            .unwrap();
        assert_eq!(outputs.get("result"), Some(&TierkreisValue::Float(3.0)));
    }

    #[test]
    fn test_signature_parses_back_into_namespaces() {
        let mut root = Namespace::new();
        let pytket = root.sub("pytket");
        pytket.add_function("double", angle_declaration(), double).unwrap();
        let mut fields = Row::new();
        fields.insert("shots".to_string(), TierkreisType::Int);
        pytket.add_named_struct("Backend", fields).unwrap();
        root.sub("qubit").add_function("h", angle_declaration(), double).unwrap();

        let signature = signature_from_proto(&root.signature()).unwrap();
        assert_eq!(signature.keys().collect::<Vec<_>>(), vec!["pytket", "qubit"]);

        let pytket = &signature["pytket"];
        assert_eq!(pytket.functions["double"].docs, "double an angle");
        assert_eq!(pytket.functions["double"].input_order, vec!["angle".to_string()]);
        assert!(pytket.aliases.contains_key("Backend"));
        assert!(signature["qubit"].functions.contains_key("h"));
    }
}

use std::fmt;
use std::rc::Rc;

use libpcap_layers::SerializedPacket;
use rhai::{Dynamic, Engine, Scope, AST};
use tracing::{debug, info, trace};

use crate::bindings::{Binding, BindingRegistry, BindingValue};
use crate::context::SharedContext;
use crate::error::ScriptError;

/// Name of the script global holding the current packet
pub const PACKET_VAR: &str = "packet";

/// Destination of the script `print` output
pub type Printer = Rc<dyn Fn(&str)>;

fn stdout_printer() -> Printer {
    Rc::new(|s: &str| println!("{s}"))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    /// The setup script is running
    SetupRun,
    Ready,
    /// The rule script is running
    Executing,
    Terminated,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::SetupRun => "setup",
            EngineState::Ready => "ready",
            EngineState::Executing => "executing",
            EngineState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Compiled per-packet rule
#[derive(Clone, Debug)]
pub enum Rule {
    /// Print the serialized packet as compact JSON
    PrintPacket,
    Script(AST),
}

/// Script sandbox, living for the whole capture
///
/// The engine and its global scope are created once. Variables and functions
/// defined by the setup script stay visible to every rule execution, while
/// variables declared by the rule itself are discarded after each packet.
pub struct ScriptEngine {
    engine: Engine,
    scope: Scope<'static>,
    context: SharedContext,
    bindings: BindingRegistry,
    printer: Printer,
    state: EngineState,
    /// Functions defined by the setup script
    setup_functions: Option<AST>,
    /// Scope size before the rule script runs
    scope_base: usize,
    packets: u64,
}

fn binding_result(v: Option<BindingValue>) -> Dynamic {
    match v {
        Some(BindingValue::Bool(b)) => Dynamic::from(b),
        Some(BindingValue::Int(i)) => Dynamic::from(i as rhai::INT),
        Some(BindingValue::Str(s)) => Dynamic::from(s),
        None => Dynamic::UNIT,
    }
}

/// Convert a script argument: strings are kept, unit is the empty string,
/// anything else is converted to its string form
fn arg_string(arg: Dynamic) -> String {
    if arg.is_unit() {
        String::new()
    } else if arg.is_string() {
        arg.into_string().unwrap_or_default()
    } else {
        arg.to_string()
    }
}

impl ScriptEngine {
    /// Create an engine with the default bindings
    pub fn new(context: SharedContext) -> Self {
        ScriptEngine::with_bindings(context, BindingRegistry::default())
    }

    pub fn with_bindings(context: SharedContext, bindings: BindingRegistry) -> Self {
        let mut engine = ScriptEngine {
            engine: Engine::new(),
            scope: Scope::new(),
            context,
            bindings,
            printer: stdout_printer(),
            state: EngineState::Uninitialized,
            setup_functions: None,
            scope_base: 0,
            packets: 0,
        };
        engine.install_printer();
        engine.engine.on_debug(|s, src, pos| match src {
            Some(src) => debug!("script debug [{src} {pos}]: {s}"),
            None => debug!("script debug [{pos}]: {s}"),
        });
        engine
    }

    /// Redirect the output of the script `print` function
    pub fn set_printer(&mut self, printer: Printer) {
        self.printer = printer;
        self.install_printer();
    }

    fn install_printer(&mut self) {
        let printer = self.printer.clone();
        self.engine.on_print(move |s: &str| printer(s));
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    pub fn bindings(&self) -> &BindingRegistry {
        &self.bindings
    }

    fn register_binding(&mut self, binding: &Rc<dyn Binding>) {
        let name = binding.name();
        trace!("registering binding {name}/{}", binding.arity());
        let (b, ctx) = (binding.clone(), self.context.clone());
        let call = Rc::new(move |mut args: Vec<String>| {
            // missing arguments default to "", extra ones are ignored
            args.truncate(b.arity());
            binding_result(b.invoke(&ctx.borrow(), &args))
        });
        let f = call.clone();
        self.engine.register_fn(name, move || f(Vec::new()));
        let f = call.clone();
        self.engine
            .register_fn(name, move |a: Dynamic| f(vec![arg_string(a)]));
        let f = call.clone();
        self.engine.register_fn(name, move |a: Dynamic, b: Dynamic| {
            f(vec![arg_string(a), arg_string(b)])
        });
        let f = call;
        self.engine
            .register_fn(name, move |a: Dynamic, b: Dynamic, c: Dynamic| {
                f(vec![arg_string(a), arg_string(b), arg_string(c)])
            });
    }

    /// Register all bindings into the sandbox
    ///
    /// Calling this function again has no effect.
    pub fn initialize(&mut self) -> Result<(), ScriptError> {
        match self.state {
            EngineState::Uninitialized => (),
            EngineState::Terminated => return Err(ScriptError::Terminated),
            _ => return Ok(()),
        }
        let bindings: Vec<_> = self.bindings.iter().cloned().collect();
        for b in &bindings {
            self.register_binding(b);
        }
        self.scope.push_dynamic(PACKET_VAR, Dynamic::UNIT);
        self.scope_base = self.scope.len();
        self.state = EngineState::Ready;
        debug!("script engine initialized ({} bindings)", bindings.len());
        Ok(())
    }

    fn packet_is_constant(&self) -> bool {
        self.scope.is_constant(PACKET_VAR).unwrap_or(false)
    }

    fn check_ready(&self) -> Result<(), ScriptError> {
        match self.state {
            EngineState::Ready => Ok(()),
            EngineState::Uninitialized => Err(ScriptError::NotInitialized),
            EngineState::Terminated => Err(ScriptError::Terminated),
            EngineState::SetupRun | EngineState::Executing => {
                Err(ScriptError::InvalidState("a script is already running"))
            }
        }
    }

    /// Run the setup script, before any packet is processed
    ///
    /// Top-level variables and functions it defines are visible to the rule script.
    pub fn run_setup(&mut self, script: &str) -> Result<(), ScriptError> {
        self.check_ready()?;
        if self.packets > 0 {
            return Err(ScriptError::InvalidState(
                "setup script must run before the first packet",
            ));
        }
        let ast = self
            .engine
            .compile_with_scope(&self.scope, script)
            .map_err(|e| ScriptError::Parse(e.to_string()))?;
        let base = self.scope.len();
        self.state = EngineState::SetupRun;
        let res = self.engine.run_ast_with_scope(&mut self.scope, &ast);
        self.state = EngineState::Ready;
        res.map_err(|e| ScriptError::Runtime(e.to_string()))?;
        if self.packet_is_constant() {
            self.scope.rewind(base);
            return Err(ScriptError::Runtime(format!(
                "setup script must not declare '{PACKET_VAR}' as a constant"
            )));
        }
        let functions = ast.clone_functions_only();
        self.setup_functions = Some(match self.setup_functions.take() {
            Some(previous) => previous.merge(&functions),
            None => functions,
        });
        self.scope_base = self.scope.len();
        info!("setup script done ({} globals)", self.scope.len() - 1);
        Ok(())
    }

    /// Compile the rule script. `None` gives the default rule
    pub fn compile_rule(&self, script: Option<&str>) -> Result<Rule, ScriptError> {
        if self.state == EngineState::Uninitialized {
            return Err(ScriptError::NotInitialized);
        }
        let script = match script {
            Some(s) => s,
            None => return Ok(Rule::PrintPacket),
        };
        let ast = self
            .engine
            .compile_with_scope(&self.scope, script)
            .map_err(|e| ScriptError::Parse(e.to_string()))?;
        let ast = match self.setup_functions {
            Some(ref functions) => functions.merge(&ast),
            None => ast,
        };
        Ok(Rule::Script(ast))
    }

    /// Expose `packet` to the sandbox and run the rule
    pub fn run_per_packet(
        &mut self,
        packet: &SerializedPacket,
        rule: &Rule,
    ) -> Result<(), ScriptError> {
        self.check_ready()?;
        self.packets += 1;
        let ast = match rule {
            Rule::PrintPacket => {
                (self.printer)(&packet.to_json_string());
                return Ok(());
            }
            Rule::Script(ast) => ast,
        };
        let value =
            rhai::serde::to_dynamic(packet).map_err(|e| ScriptError::Marshal(e.to_string()))?;
        // set_value panics on constants
        if self.packet_is_constant() {
            return Err(ScriptError::Runtime(format!(
                "'{PACKET_VAR}' is a constant"
            )));
        }
        self.scope.set_value(PACKET_VAR, value);
        self.state = EngineState::Executing;
        let res = self.engine.run_ast_with_scope(&mut self.scope, ast);
        // forget variables declared by the rule
        self.scope.rewind(self.scope_base);
        self.state = EngineState::Ready;
        res.map_err(|e| ScriptError::Runtime(e.to_string()))
    }

    /// Release the sandbox. Later executions are rejected.
    pub fn terminate(&mut self) {
        if self.state != EngineState::Terminated {
            debug!("script engine terminated after {} packets", self.packets);
            self.state = EngineState::Terminated;
            self.scope.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::tests::arp_context;
    use crate::context::PacketContext;
    use libpcap_layers::LayerSerializer;
    use std::cell::RefCell;

    struct Setup {
        engine: ScriptEngine,
        output: Rc<RefCell<Vec<String>>>,
        packet: SerializedPacket,
    }

    fn setup() -> Setup {
        let ctx = arp_context();
        let packet = LayerSerializer::default().serialize(ctx.layers());
        let shared = Rc::new(RefCell::new(ctx));
        let mut engine = ScriptEngine::new(shared);
        let output = Rc::new(RefCell::new(Vec::new()));
        let out = output.clone();
        engine.set_printer(Rc::new(move |s: &str| out.borrow_mut().push(s.to_owned())));
        engine.initialize().expect("initialize");
        Setup {
            engine,
            output,
            packet,
        }
    }

    fn run(s: &mut Setup, rule: &Rule) -> Result<(), ScriptError> {
        s.engine.run_per_packet(&s.packet, rule)
    }

    #[test]
    fn lifecycle() {
        let mut engine = ScriptEngine::new(PacketContext::new_shared());
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert_eq!(
            engine.run_per_packet(&SerializedPacket::default(), &Rule::PrintPacket),
            Err(ScriptError::NotInitialized)
        );
        assert_eq!(engine.run_setup("let a = 1;"), Err(ScriptError::NotInitialized));
        engine.initialize().expect("initialize");
        engine.initialize().expect("initialize is idempotent");
        assert_eq!(engine.state(), EngineState::Ready);
        engine.terminate();
        assert_eq!(engine.state(), EngineState::Terminated);
        assert_eq!(
            engine.run_per_packet(&SerializedPacket::default(), &Rule::PrintPacket),
            Err(ScriptError::Terminated)
        );
    }

    #[test]
    fn setup_globals_and_functions() {
        let mut s = setup();
        s.engine
            .run_setup("let seen = 0; fn double(x) { x * 2 }")
            .expect("setup");
        let rule = s
            .engine
            .compile_rule(Some("seen += 1; print(seen); print(double(21));"))
            .expect("compile");
        run(&mut s, &rule).expect("run");
        run(&mut s, &rule).expect("run");
        assert_eq!(*s.output.borrow(), vec!["1", "42", "2", "42"]);
    }

    #[test]
    fn rule_variables_are_discarded() {
        let mut s = setup();
        let rule = s
            .engine
            .compile_rule(Some(r#"if is_def_var("tmp") { print("leak"); } let tmp = 1;"#))
            .expect("compile");
        run(&mut s, &rule).expect("run");
        run(&mut s, &rule).expect("run");
        assert!(s.output.borrow().is_empty());
    }

    #[test]
    fn packet_global() {
        let mut s = setup();
        let rule = s
            .engine
            .compile_rule(Some(
                "print(packet.len()); print(packet[1].name); print(hardwareAddrStr(packet[0].info.SrcMAC));",
            ))
            .expect("compile");
        run(&mut s, &rule).expect("run");
        assert_eq!(*s.output.borrow(), vec!["2", "ARP", "00:11:22:33:44:55"]);
    }

    #[test]
    fn bindings_from_script() {
        let mut s = setup();
        let rule = s
            .engine
            .compile_rule(Some(
                r#"print(containsLayer("ARP")); print(layerIndex("ARP")); print(type_of(layerIndex("TCP")));
                print(containsLayer()); print(type_of(layerIndex(42))); print(type_of(hexdump("")));"#,
            ))
            .expect("compile");
        run(&mut s, &rule).expect("run");
        assert_eq!(*s.output.borrow(), vec!["true", "1", "()", "false", "()", "()"]);
    }

    #[test]
    fn extra_binding_arguments_are_ignored() {
        let mut s = setup();
        let rule = s
            .engine
            .compile_rule(Some(
                r#"print(containsLayer("ARP", 1)); print(type_of(layerIndex("TCP", 2, 3)));
                print(hardwareAddrStr(packet[0].info.SrcMAC, "x")); print(prettyPacket(1).starts_with("PACKET:"));"#,
            ))
            .expect("compile");
        run(&mut s, &rule).expect("run");
        assert_eq!(
            *s.output.borrow(),
            vec!["true", "()", "00:11:22:33:44:55", "true"]
        );
    }

    #[test]
    fn constant_packet_from_setup() {
        let mut s = setup();
        assert!(matches!(
            s.engine.run_setup("let before = 1; const packet = 1;"),
            Err(ScriptError::Runtime(_))
        ));
        // the rejected setup leaves `packet` writable
        let rule = s
            .engine
            .compile_rule(Some("print(packet.len());"))
            .expect("compile");
        run(&mut s, &rule).expect("run");
        assert_eq!(*s.output.borrow(), vec!["2"]);
    }

    #[test]
    fn default_rule_prints_json() {
        let mut s = setup();
        let rule = s.engine.compile_rule(None).expect("compile");
        run(&mut s, &rule).expect("run");
        let output = s.output.borrow();
        assert_eq!(output.len(), 1);
        assert!(output[0].starts_with(r#"[{"name":"Ethernet","info":{"Contents":"#));
    }

    #[test]
    fn script_errors() {
        let mut s = setup();
        assert!(matches!(
            s.engine.compile_rule(Some("let = ;")),
            Err(ScriptError::Parse(_))
        ));
        assert!(matches!(s.engine.run_setup("fn ("), Err(ScriptError::Parse(_))));
        assert!(matches!(
            s.engine.run_setup(r#"throw "setup failed";"#),
            Err(ScriptError::Runtime(_))
        ));
        let rule = s
            .engine
            .compile_rule(Some(r#"throw "boom";"#))
            .expect("compile");
        assert!(matches!(run(&mut s, &rule), Err(ScriptError::Runtime(_))));
        // the engine is usable after a failed rule
        assert_eq!(s.engine.state(), EngineState::Ready);
    }

    #[test]
    fn setup_after_first_packet() {
        let mut s = setup();
        run(&mut s, &Rule::PrintPacket).expect("run");
        assert!(matches!(
            s.engine.run_setup("let a = 1;"),
            Err(ScriptError::InvalidState(_))
        ));
    }
}

//! Single-pass compiler for the Jack language.
//!
//! A recursive-descent parser that emits VM commands while it parses; no
//! syntax tree is built and the token stream is consumed exactly once with a
//! single token of lookahead. The recursion stack is the only parsing state.
//!
//! Every error is fatal for the file being compiled and surfaces immediately
//! through `?`.

use crate::error::CompileError;
use crate::symbol_table::{Symbol, SymbolKind, SymbolTable, VarType};
use crate::token::{Keyword, Span, SpannedToken, Token};
use crate::tokenizer::Tokenizer;
use crate::vm_writer::{VmOp, VmWriter};

/// Maximum expression nesting depth before the compiler bails out.
/// Prevents stack overflow on pathological input (e.g., `(((((...)))))`).
const MAX_DEPTH: usize = 25;

/// The kind of subroutine being compiled, determining its entry sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubroutineKind {
    Constructor,
    Function,
    Method,
}

/// Single-pass Jack to VM compiler for one source file.
pub struct Compiler<'a> {
    tokens: Tokenizer<'a>,
    symbols: SymbolTable,
    vm: VmWriter,
    /// The one-token lookahead.
    current: Option<SpannedToken>,
    /// Span of the most recently consumed token, for end-of-file errors.
    last_span: Span,
    /// Monotonic counter backing control-flow label prefixes.
    next_label_id: u64,
    depth: usize,
}

impl<'a> Compiler<'a> {
    /// Create a compiler for the given source.
    pub fn new(source: &'a str) -> Self {
        Self {
            tokens: Tokenizer::new(source),
            symbols: SymbolTable::new(),
            vm: VmWriter::new(),
            current: None,
            last_span: Span::new(0, 0, 1, 1),
            next_label_id: 0,
            depth: 0,
        }
    }

    /// Compile the source as a single Jack class and return the VM code.
    pub fn compile(mut self) -> Result<String, CompileError> {
        self.advance()?;
        self.compile_class()?;
        Ok(self.vm.into_output())
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    fn advance(&mut self) -> Result<(), CompileError> {
        if let Some(token) = &self.current {
            self.last_span = token.span.clone();
        }
        self.current = self.tokens.next_token()?;
        Ok(())
    }

    fn current_span(&self) -> Span {
        self.current
            .as_ref()
            .map(|t| t.span.clone())
            .unwrap_or_else(|| self.last_span.clone())
    }

    fn current_desc(&self) -> String {
        self.current
            .as_ref()
            .map(|t| t.token.to_string())
            .unwrap_or_else(|| "end of file".to_string())
    }

    fn peek_token(&self) -> Option<&Token> {
        self.current.as_ref().map(|t| &t.token)
    }

    fn peek_keyword(&self) -> Option<Keyword> {
        match self.peek_token() {
            Some(Token::Keyword(k)) => Some(*k),
            _ => None,
        }
    }

    fn peek_symbol(&self) -> Option<char> {
        match self.peek_token() {
            Some(Token::Symbol(c)) => Some(*c),
            _ => None,
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), CompileError> {
        if self.peek_keyword() == Some(keyword) {
            self.advance()
        } else {
            Err(CompileError::syntax_expected(
                self.current_span(),
                format!(
                    "expected keyword '{}', got {}",
                    keyword.as_str(),
                    self.current_desc()
                ),
                vec![keyword.as_str().to_string()],
            ))
        }
    }

    fn expect_symbol(&mut self, symbol: char) -> Result<(), CompileError> {
        if self.peek_symbol() == Some(symbol) {
            self.advance()
        } else {
            Err(CompileError::syntax_expected(
                self.current_span(),
                format!("expected '{}', got {}", symbol, self.current_desc()),
                vec![symbol.to_string()],
            ))
        }
    }

    fn expect_identifier(&mut self) -> Result<(String, Span), CompileError> {
        if let Some(Token::Identifier(name)) = self.peek_token().cloned() {
            let span = self.current_span();
            self.advance()?;
            Ok((name, span))
        } else {
            Err(CompileError::syntax_expected(
                self.current_span(),
                format!("expected identifier, got {}", self.current_desc()),
                vec!["identifier".to_string()],
            ))
        }
    }

    /// type: 'int' | 'char' | 'boolean' | className
    fn expect_type(&mut self) -> Result<VarType, CompileError> {
        let var_type = match self.peek_token() {
            Some(Token::Keyword(Keyword::Int)) => VarType::Int,
            Some(Token::Keyword(Keyword::Char)) => VarType::Char,
            Some(Token::Keyword(Keyword::Boolean)) => VarType::Boolean,
            Some(Token::Identifier(name)) => VarType::Class(name.clone()),
            _ => {
                return Err(CompileError::syntax_expected(
                    self.current_span(),
                    format!("expected type, got {}", self.current_desc()),
                    vec![
                        "int".to_string(),
                        "char".to_string(),
                        "boolean".to_string(),
                        "class name".to_string(),
                    ],
                ));
            }
        };
        self.advance()?;
        Ok(var_type)
    }

    fn lookup_variable(&self, name: &str, span: &Span) -> Result<Symbol, CompileError> {
        self.symbols
            .lookup(name)
            .cloned()
            .ok_or_else(|| CompileError::undefined_variable(name, span.clone()))
    }

    /// Generate a fresh label prefix; `L7:` yields labels like `L7:ELSE`.
    fn next_label_prefix(&mut self) -> String {
        let id = self.next_label_id;
        self.next_label_id += 1;
        format!("L{}:", id)
    }

    // ========================================================================
    // Class structure
    // ========================================================================

    /// class: 'class' className '{' classVarDec* subroutineDec* '}'
    ///
    /// After the closing brace the token stream must be exhausted.
    fn compile_class(&mut self) -> Result<(), CompileError> {
        self.expect_keyword(Keyword::Class)?;
        let (name, _) = self.expect_identifier()?;
        self.symbols.start_class(&name);
        self.expect_symbol('{')?;

        while matches!(self.peek_keyword(), Some(Keyword::Static | Keyword::Field)) {
            self.compile_class_var_dec()?;
        }

        while matches!(
            self.peek_keyword(),
            Some(Keyword::Constructor | Keyword::Function | Keyword::Method)
        ) {
            self.compile_subroutine_dec()?;
        }

        self.expect_symbol('}')?;

        if let Some(token) = &self.current {
            return Err(CompileError::syntax(
                token.span.clone(),
                format!("unexpected {} after end of class", token.token),
            ));
        }
        Ok(())
    }

    /// classVarDec: ('static' | 'field') type varName (',' varName)* ';'
    ///
    /// Declarations emit no code.
    fn compile_class_var_dec(&mut self) -> Result<(), CompileError> {
        let kind = match self.peek_keyword() {
            Some(Keyword::Static) => SymbolKind::Static,
            _ => SymbolKind::Field,
        };
        self.advance()?;
        self.compile_var_sequence(kind)?;
        Ok(())
    }

    /// type varName (',' varName)* ';' with every name declared as `kind`.
    ///
    /// Returns the number of names declared.
    fn compile_var_sequence(&mut self, kind: SymbolKind) -> Result<u16, CompileError> {
        let var_type = self.expect_type()?;
        let mut count = 0;
        loop {
            let (name, span) = self.expect_identifier()?;
            self.symbols.define(&name, var_type.clone(), kind, span)?;
            count += 1;
            if self.peek_symbol() == Some(',') {
                self.advance()?;
            } else {
                break;
            }
        }
        self.expect_symbol(';')?;
        Ok(count)
    }

    /// subroutineDec: ('constructor'|'function'|'method') ('void'|type)
    ///                subroutineName '(' parameterList ')' subroutineBody
    fn compile_subroutine_dec(&mut self) -> Result<(), CompileError> {
        let kind = match self.peek_keyword() {
            Some(Keyword::Constructor) => SubroutineKind::Constructor,
            Some(Keyword::Method) => SubroutineKind::Method,
            _ => SubroutineKind::Function,
        };
        let dec_span = self.current_span();
        self.advance()?;

        self.symbols.start_subroutine();

        // A method receives its object as an implicit first argument.
        if kind == SubroutineKind::Method {
            let class_type = VarType::Class(self.symbols.class_name().to_string());
            self.symbols
                .define("this", class_type, SymbolKind::Argument, dec_span)?;
        }

        // Return type is not tracked; 'void' only affects the callers.
        if self.peek_keyword() == Some(Keyword::Void) {
            self.advance()?;
        } else {
            self.expect_type()?;
        }

        let (name, _) = self.expect_identifier()?;

        self.expect_symbol('(')?;
        if self.peek_symbol() != Some(')') {
            self.compile_parameter_list()?;
        }
        self.expect_symbol(')')?;

        self.compile_subroutine_body(&name, kind)
    }

    /// parameterList: type varName (',' type varName)*
    fn compile_parameter_list(&mut self) -> Result<(), CompileError> {
        loop {
            let var_type = self.expect_type()?;
            let (name, span) = self.expect_identifier()?;
            self.symbols
                .define(&name, var_type, SymbolKind::Argument, span)?;
            if self.peek_symbol() == Some(',') {
                self.advance()?;
            } else {
                break;
            }
        }
        Ok(())
    }

    /// subroutineBody: '{' varDec* statements '}'
    ///
    /// The function declaration is emitted once all `var` declarations are
    /// parsed and the local count is known; the entry sequence then depends
    /// on the subroutine kind.
    fn compile_subroutine_body(
        &mut self,
        name: &str,
        kind: SubroutineKind,
    ) -> Result<(), CompileError> {
        self.expect_symbol('{')?;

        let mut num_locals = 0;
        while self.peek_keyword() == Some(Keyword::Var) {
            self.advance()?;
            num_locals += self.compile_var_sequence(SymbolKind::Local)?;
        }

        let qualified = format!("{}.{}", self.symbols.class_name(), name);
        self.vm.write_function(&qualified, num_locals);

        match kind {
            SubroutineKind::Constructor => {
                // Allocate the object and install it as `this`.
                let field_count = self.symbols.field_count();
                self.vm.write_push("constant", field_count);
                self.vm.write_call("Memory.alloc", 1);
                self.vm.write_pop("pointer", 0);
            }
            SubroutineKind::Method => {
                // The receiver arrives as argument 0.
                self.vm.write_push("argument", 0);
                self.vm.write_pop("pointer", 0);
            }
            SubroutineKind::Function => {}
        }

        self.compile_statements()?;
        self.expect_symbol('}')
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// statements: statement* up to the enclosing '}' (not consumed here)
    fn compile_statements(&mut self) -> Result<(), CompileError> {
        while self.peek_symbol() != Some('}') {
            match self.peek_keyword() {
                Some(Keyword::Let) => self.compile_let()?,
                Some(Keyword::If) => self.compile_if()?,
                Some(Keyword::While) => self.compile_while()?,
                Some(Keyword::Do) => self.compile_do()?,
                Some(Keyword::Return) => self.compile_return()?,
                _ => {
                    return Err(CompileError::syntax_expected(
                        self.current_span(),
                        format!("expected statement, got {}", self.current_desc()),
                        vec![
                            "let".to_string(),
                            "if".to_string(),
                            "while".to_string(),
                            "do".to_string(),
                            "return".to_string(),
                        ],
                    ));
                }
            }
        }
        Ok(())
    }

    /// letStatement: 'let' varName ('[' expression ']')? '=' expression ';'
    fn compile_let(&mut self) -> Result<(), CompileError> {
        self.expect_keyword(Keyword::Let)?;
        let (name, span) = self.expect_identifier()?;
        let symbol = self.lookup_variable(&name, &span)?;

        if self.peek_symbol() == Some('[') {
            // Destination address: index expression plus base pointer.
            self.advance()?;
            self.compile_expression()?;
            self.vm.write_push(symbol.segment(), symbol.index);
            self.vm.write_arithmetic(VmOp::Add);
            self.expect_symbol(']')?;

            self.expect_symbol('=')?;
            self.compile_expression()?;
            self.expect_symbol(';')?;

            // Stash the value, aim `that` at the destination, store.
            self.vm.write_pop("temp", 0);
            self.vm.write_pop("pointer", 1);
            self.vm.write_push("temp", 0);
            self.vm.write_pop("that", 0);
        } else {
            self.expect_symbol('=')?;
            self.compile_expression()?;
            self.expect_symbol(';')?;
            self.vm.write_pop(symbol.segment(), symbol.index);
        }
        Ok(())
    }

    /// ifStatement: 'if' '(' expression ')' '{' statements '}'
    ///              ('else' '{' statements '}')?
    ///
    /// The ELSE label is emitted whether or not an else clause exists.
    fn compile_if(&mut self) -> Result<(), CompileError> {
        self.expect_keyword(Keyword::If)?;
        self.expect_symbol('(')?;

        let prefix = self.next_label_prefix();

        self.compile_expression()?;
        self.vm.write_arithmetic(VmOp::Not);
        self.vm.write_if_goto(&format!("{}ELSE", prefix));

        self.expect_symbol(')')?;
        self.expect_symbol('{')?;
        self.compile_statements()?;
        self.expect_symbol('}')?;

        self.vm.write_goto(&format!("{}END", prefix));
        self.vm.write_label(&format!("{}ELSE", prefix));

        if self.peek_keyword() == Some(Keyword::Else) {
            self.advance()?;
            self.expect_symbol('{')?;
            self.compile_statements()?;
            self.expect_symbol('}')?;
        }

        self.vm.write_label(&format!("{}END", prefix));
        Ok(())
    }

    /// whileStatement: 'while' '(' expression ')' '{' statements '}'
    fn compile_while(&mut self) -> Result<(), CompileError> {
        self.expect_keyword(Keyword::While)?;
        self.expect_symbol('(')?;

        let prefix = self.next_label_prefix();

        self.vm.write_label(&format!("{}BEGIN", prefix));
        self.compile_expression()?;
        self.vm.write_arithmetic(VmOp::Not);
        self.vm.write_if_goto(&format!("{}EXIT", prefix));

        self.expect_symbol(')')?;
        self.expect_symbol('{')?;
        self.compile_statements()?;
        self.expect_symbol('}')?;

        self.vm.write_goto(&format!("{}BEGIN", prefix));
        self.vm.write_label(&format!("{}EXIT", prefix));
        Ok(())
    }

    /// doStatement: 'do' subroutineCall ';'
    fn compile_do(&mut self) -> Result<(), CompileError> {
        self.expect_keyword(Keyword::Do)?;
        let (name, _) = self.expect_identifier()?;
        self.compile_subroutine_call(name)?;
        self.expect_symbol(';')?;
        // Discard the unused return value.
        self.vm.write_pop("temp", 0);
        Ok(())
    }

    /// returnStatement: 'return' expression? ';'
    ///
    /// A void return still pushes a value; the VM calling convention always
    /// returns one word.
    fn compile_return(&mut self) -> Result<(), CompileError> {
        self.expect_keyword(Keyword::Return)?;
        if self.peek_symbol() == Some(';') {
            self.vm.write_push("constant", 0);
        } else {
            self.compile_expression()?;
        }
        self.expect_symbol(';')?;
        self.vm.write_return();
        Ok(())
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// expression: term (op term)*
    ///
    /// All binary operators share one precedence level and associate to the
    /// left: each term is emitted, then its preceding operator. This is the
    /// Jack language definition, not a shortcut.
    fn compile_expression(&mut self) -> Result<(), CompileError> {
        self.compile_term()?;
        while let Some(op) = self.peek_binary_op() {
            self.advance()?;
            self.compile_term()?;
            self.vm.write_arithmetic(op);
        }
        Ok(())
    }

    fn peek_binary_op(&self) -> Option<VmOp> {
        match self.peek_symbol()? {
            '+' => Some(VmOp::Add),
            '-' => Some(VmOp::Sub),
            '*' => Some(VmOp::Mul),
            '/' => Some(VmOp::Div),
            '&' => Some(VmOp::And),
            '|' => Some(VmOp::Or),
            '<' => Some(VmOp::Lt),
            '>' => Some(VmOp::Gt),
            '=' => Some(VmOp::Eq),
            _ => None,
        }
    }

    /// term: integerConstant | stringConstant | keywordConstant | varName |
    ///       varName '[' expression ']' | subroutineCall |
    ///       '(' expression ')' | unaryOp term
    fn compile_term(&mut self) -> Result<(), CompileError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            self.depth -= 1;
            return Err(CompileError::syntax(
                self.current_span(),
                "expression nesting too deep".to_string(),
            ));
        }
        let result = self.compile_term_inner();
        self.depth -= 1;
        result
    }

    /// Inner term logic, separated to guarantee depth decrement on all paths.
    fn compile_term_inner(&mut self) -> Result<(), CompileError> {
        let Some(token) = self.current.clone() else {
            return Err(CompileError::syntax(
                self.current_span(),
                "expected term, got end of file".to_string(),
            ));
        };

        match token.token {
            Token::IntegerConstant(value) => {
                if value > 32767 {
                    return Err(CompileError::integer_range(value, token.span));
                }
                self.vm.write_push("constant", value as u16);
                self.advance()
            }

            Token::StringConstant(s) => {
                // Jack strings are 8-bit; wider code points cannot be
                // rebuilt through String.appendChar.
                for ch in s.chars() {
                    if ch as u32 > 255 {
                        return Err(CompileError::unsupported_character(ch, token.span));
                    }
                }
                self.vm.write_string_constant(&s);
                self.advance()
            }

            Token::Keyword(Keyword::True) => {
                // true is all ones: ~0
                self.vm.write_push("constant", 0);
                self.vm.write_arithmetic(VmOp::Not);
                self.advance()
            }
            Token::Keyword(Keyword::False | Keyword::Null) => {
                self.vm.write_push("constant", 0);
                self.advance()
            }
            Token::Keyword(Keyword::This) => {
                self.vm.write_push("pointer", 0);
                self.advance()
            }

            Token::Symbol('(') => {
                self.advance()?;
                self.compile_expression()?;
                self.expect_symbol(')')
            }

            Token::Symbol('-') => {
                self.advance()?;
                self.compile_term()?;
                self.vm.write_arithmetic(VmOp::Neg);
                Ok(())
            }
            Token::Symbol('~') => {
                self.advance()?;
                self.compile_term()?;
                self.vm.write_arithmetic(VmOp::Not);
                Ok(())
            }

            Token::Identifier(name) => {
                self.advance()?;
                match self.peek_symbol() {
                    Some('[') => {
                        // Element read: address = index + base, via `that`.
                        self.advance()?;
                        self.compile_expression()?;
                        let symbol = self.lookup_variable(&name, &token.span)?;
                        self.vm.write_push(symbol.segment(), symbol.index);
                        self.vm.write_arithmetic(VmOp::Add);
                        self.expect_symbol(']')?;
                        self.vm.write_pop("pointer", 1);
                        self.vm.write_push("that", 0);
                        Ok(())
                    }
                    Some('(') | Some('.') => self.compile_subroutine_call(name),
                    _ => {
                        let symbol = self.lookup_variable(&name, &token.span)?;
                        self.vm.write_push(symbol.segment(), symbol.index);
                        Ok(())
                    }
                }
            }

            _ => Err(CompileError::syntax_expected(
                token.span,
                format!("expected term, got {}", token.token),
                vec![
                    "integer constant".to_string(),
                    "string constant".to_string(),
                    "keyword constant".to_string(),
                    "'('".to_string(),
                    "unary operator".to_string(),
                    "identifier".to_string(),
                ],
            )),
        }
    }

    /// subroutineCall: subroutineName '(' expressionList ')' |
    ///                 (className | varName) '.' subroutineName
    ///                 '(' expressionList ')'
    ///
    /// `name` has already been consumed. An unqualified call is a method on
    /// the current object. For a qualified call the receiver decides the
    /// dispatch: a known variable is pushed as implicit first argument and
    /// its declared type qualifies the target; an unknown name is taken to
    /// be a class name and the call carries no receiver.
    fn compile_subroutine_call(&mut self, name: String) -> Result<(), CompileError> {
        match self.peek_symbol() {
            Some('.') => {
                self.advance()?;
                let (method, _) = self.expect_identifier()?;

                let (target, receiver_args) = match self.symbols.lookup(&name) {
                    Some(symbol) => {
                        let symbol = symbol.clone();
                        self.vm.write_push(symbol.segment(), symbol.index);
                        (format!("{}.{}", symbol.var_type, method), 1)
                    }
                    None => (format!("{}.{}", name, method), 0),
                };

                self.expect_symbol('(')?;
                let num_args = receiver_args + self.compile_expression_list()?;
                self.expect_symbol(')')?;

                self.vm.write_call(&target, num_args);
                Ok(())
            }
            Some('(') => {
                self.vm.write_push("pointer", 0);
                self.advance()?;
                let num_args = 1 + self.compile_expression_list()?;
                self.expect_symbol(')')?;

                let target = format!("{}.{}", self.symbols.class_name(), name);
                self.vm.write_call(&target, num_args);
                Ok(())
            }
            _ => Err(CompileError::syntax_expected(
                self.current_span(),
                format!("expected '(' or '.', got {}", self.current_desc()),
                vec!["(".to_string(), ".".to_string()],
            )),
        }
    }

    /// expressionList: (expression (',' expression)*)?
    ///
    /// Returns the number of expressions, which becomes the argument count.
    fn compile_expression_list(&mut self) -> Result<u16, CompileError> {
        let mut count = 0;
        if self.peek_symbol() != Some(')') {
            self.compile_expression()?;
            count = 1;
            while self.peek_symbol() == Some(',') {
                self.advance()?;
                self.compile_expression()?;
                count += 1;
            }
        }
        Ok(count)
    }
}

//! Builtin namespace registration
//!
//! Metadata quality deliberately varies: some callables expose a structured
//! signature, some only a text signature or a doc string, some nothing.

use std::sync::Arc;

use super::error::{InterpResult, RuntimeError};
use super::value::Value;
use super::{AttrDef, ClassDef, Constructor, Entry, FunctionDef, Interpreter, SignatureSource};
use crate::runtime::{Annotation, Param, ParamKind, Signature, Wrapper};

// ============================================================================
// Metadata helpers
// ============================================================================

fn structured(name: &str, sig: Signature) -> FunctionDef {
    FunctionDef::new(name, SignatureSource::Structured(sig))
}

/// Introspection fails; only the text signature is usable.
fn text(name: &str, text_sig: &str) -> FunctionDef {
    FunctionDef::new(name, SignatureSource::Broken("builtin without signature metadata".into()))
        .with_text(text_sig)
}

fn documented(name: &str, doc: &str) -> FunctionDef {
    FunctionDef::new(name, SignatureSource::Missing).with_doc(doc)
}

fn opaque(name: &str) -> FunctionDef {
    FunctionDef::new(name, SignatureSource::Missing)
}

fn init(params: Vec<Param>) -> SignatureSource {
    let mut all = vec![Param::positional("self")];
    all.extend(params);
    SignatureSource::Structured(Signature::new(all))
}

fn optional(name: &str) -> Param {
    Param::new(name, ParamKind::PositionalOnly).with_default()
}

fn class_level(function: FunctionDef) -> AttrDef {
    AttrDef::wrapped(Wrapper::ClassLevel, function)
}

fn receiver_free(function: FunctionDef) -> AttrDef {
    AttrDef::wrapped(Wrapper::ReceiverFree, function)
}

// ============================================================================
// Native constructors
// ============================================================================

fn new_object(args: &[Value]) -> InterpResult<Value> {
    match args {
        [] => Ok(Value::instance("object", Vec::new())),
        _ => Err(RuntimeError::arity_mismatch("object", "0", args.len())),
    }
}

fn new_none(args: &[Value]) -> InterpResult<Value> {
    match args {
        [] => Ok(Value::None),
        _ => Err(RuntimeError::arity_mismatch("NoneType", "0", args.len())),
    }
}

fn new_bool(args: &[Value]) -> InterpResult<Value> {
    match args {
        [] => Ok(Value::Bool(false)),
        [x] => Ok(Value::Bool(x.is_truthy())),
        _ => Err(RuntimeError::arity_mismatch("bool", "0 to 1", args.len())),
    }
}

fn new_int(args: &[Value]) -> InterpResult<Value> {
    match args {
        [] => Ok(Value::Int(0)),
        [Value::Float(f)] if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
        [Value::Str(s)] => parse_int(s, 10),
        [Value::Str(s), Value::Int(base)] if (2..=36).contains(base) => parse_int(s, *base as u32),
        [x] => x
            .as_int()
            .map(Value::Int)
            .ok_or_else(|| RuntimeError::type_error("a number or string", x.type_name())),
        _ => Err(RuntimeError::arity_mismatch("int", "0 to 2", args.len())),
    }
}

fn parse_int(s: &str, base: u32) -> InterpResult<Value> {
    i64::from_str_radix(s.trim(), base)
        .map(Value::Int)
        .map_err(|_| RuntimeError::value_error(format!("invalid literal for int(): '{s}'")))
}

fn new_float(args: &[Value]) -> InterpResult<Value> {
    match args {
        [] => Ok(Value::Float(0.0)),
        [Value::Str(s)] => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| RuntimeError::value_error(format!("could not convert string to float: '{s}'"))),
        [x] => x
            .as_float()
            .map(Value::Float)
            .ok_or_else(|| RuntimeError::type_error("a number or string", x.type_name())),
        _ => Err(RuntimeError::arity_mismatch("float", "0 to 1", args.len())),
    }
}

fn new_str(args: &[Value]) -> InterpResult<Value> {
    match args {
        [] => Ok(Value::str("")),
        [x] => Ok(Value::str(&x.to_string())),
        _ => Err(RuntimeError::arity_mismatch("str", "0 to 1", args.len())),
    }
}

fn new_bytes(args: &[Value]) -> InterpResult<Value> {
    match args {
        [] => Ok(Value::Bytes(Arc::from(Vec::new()))),
        [Value::Int(n)] => {
            let len = usize::try_from(*n).map_err(|_| RuntimeError::value_error("negative count"))?;
            Ok(Value::Bytes(vec![0u8; len].into()))
        }
        [Value::Str(_)] => Err(RuntimeError::type_error("an encoding", "a string argument without one")),
        [x] => {
            let items = x
                .iter_items()
                .ok_or_else(|| RuntimeError::type_error("an iterable", x.type_name()))?;
            let bytes = items
                .iter()
                .map(|v| {
                    v.as_int()
                        .and_then(|n| u8::try_from(n).ok())
                        .ok_or_else(|| RuntimeError::value_error("bytes must be in range(0, 256)"))
                })
                .collect::<InterpResult<Vec<u8>>>()?;
            Ok(Value::Bytes(bytes.into()))
        }
        _ => Err(RuntimeError::arity_mismatch("bytes", "0 to 1", args.len())),
    }
}

fn items_of(class: &str, args: &[Value]) -> InterpResult<Vec<Value>> {
    match args {
        [] => Ok(Vec::new()),
        [x] => x
            .iter_items()
            .ok_or_else(|| RuntimeError::type_error("an iterable", x.type_name())),
        _ => Err(RuntimeError::arity_mismatch(class, "0 to 1", args.len())),
    }
}

fn new_list(args: &[Value]) -> InterpResult<Value> {
    items_of("list", args).map(Value::list)
}

fn new_tuple(args: &[Value]) -> InterpResult<Value> {
    items_of("tuple", args).map(Value::tuple)
}

fn new_set(args: &[Value]) -> InterpResult<Value> {
    let mut unique: Vec<Value> = Vec::new();
    for item in items_of("set", args)? {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    Ok(Value::Set(Arc::new(unique)))
}

fn new_dict(args: &[Value]) -> InterpResult<Value> {
    match args {
        [] => Ok(Value::Dict(Arc::new(Vec::new()))),
        [Value::Dict(pairs)] => Ok(Value::Dict(Arc::clone(pairs))),
        [x] => {
            let items = x
                .iter_items()
                .ok_or_else(|| RuntimeError::type_error("an iterable of pairs", x.type_name()))?;
            let pairs = items
                .into_iter()
                .map(|item| match item.iter_items().as_deref() {
                    Some([k, v]) => Ok((k.clone(), v.clone())),
                    _ => Err(RuntimeError::value_error("dictionary update sequence element has wrong length")),
                })
                .collect::<InterpResult<Vec<_>>>()?;
            Ok(Value::Dict(Arc::new(pairs)))
        }
        _ => Err(RuntimeError::arity_mismatch("dict", "0 to 1", args.len())),
    }
}

fn new_range(args: &[Value]) -> InterpResult<Value> {
    let ints = args
        .iter()
        .map(|v| v.as_int().ok_or_else(|| RuntimeError::type_error("an integer", v.type_name())))
        .collect::<InterpResult<Vec<i64>>>()?;
    match ints.as_slice() {
        [stop] => Ok(Value::Range(0, *stop, 1)),
        [start, stop] => Ok(Value::Range(*start, *stop, 1)),
        [_, _, 0] => Err(RuntimeError::value_error("range() arg 3 must not be zero")),
        [start, stop, step] => Ok(Value::Range(*start, *stop, *step)),
        _ => Err(RuntimeError::arity_mismatch("range", "1 to 3", args.len())),
    }
}

fn new_exception(args: &[Value]) -> InterpResult<Value> {
    Ok(Value::instance("Exception", args.to_vec()))
}

fn new_pair(args: &[Value]) -> InterpResult<Value> {
    match args {
        [first] => Ok(Value::instance("Pair", vec![first.clone(), Value::None])),
        [first, second] => Ok(Value::instance("Pair", vec![first.clone(), second.clone()])),
        _ => Err(RuntimeError::arity_mismatch("Pair", "1 to 2", args.len())),
    }
}

// ============================================================================
// Classes
// ============================================================================

fn numeric_classes() -> Vec<ClassDef> {
    let bool_class = ClassDef::new("bool", Constructor::Native(new_bool), init(vec![optional("o")]));

    let int = ClassDef::new(
        "int",
        Constructor::Native(new_int),
        SignatureSource::Broken("multiple signatures".into()),
    )
    .with(AttrDef::method(text("bit_length", "($self, /)")))
    .with(AttrDef::method(text("bit_count", "($self, /)")))
    .with(AttrDef::method(text(
        "to_bytes",
        "($self, /, length=1, byteorder='big', *, signed=False)",
    )))
    .with(class_level(text(
        "from_bytes",
        "($type, /, bytes, byteorder='big', *, signed=False)",
    )))
    .with(AttrDef::method(text("as_integer_ratio", "($self, /)")))
    .with(AttrDef::method(documented(
        "conjugate",
        "Returns self, the complex conjugate of any int.",
    )))
    .with(AttrDef::data("real", "int"))
    .with(AttrDef::data("imag", "int"))
    .with(AttrDef::data("numerator", "int"))
    .with(AttrDef::data("denominator", "int"));

    let float = ClassDef::new("float", Constructor::Native(new_float), init(vec![optional("x")]))
        .with(AttrDef::method(text("is_integer", "($self, /)")))
        .with(AttrDef::method(text("hex", "($self, /)")))
        .with(class_level(text("fromhex", "($type, string, /)")))
        .with(AttrDef::data("real", "float"))
        .with(AttrDef::data("imag", "float"));

    vec![bool_class, int, float]
}

fn text_classes() -> Vec<ClassDef> {
    let s = ClassDef::new(
        "str",
        Constructor::Native(new_str),
        SignatureSource::Broken("multiple signatures".into()),
    )
    .with(AttrDef::method(text("upper", "($self, /)")))
    .with(AttrDef::method(text("lower", "($self, /)")))
    .with(AttrDef::method(text("strip", "($self, chars=None, /)")))
    .with(AttrDef::method(text("split", "($self, /, sep=None, maxsplit=-1)")))
    .with(AttrDef::method(text("join", "($self, iterable, /)")))
    .with(AttrDef::method(text("replace", "($self, old, new, count=-1, /)")))
    .with(AttrDef::method(documented(
        "startswith",
        "S.startswith(prefix[, start[, end]]) -> bool\n\nReturn True if S starts with the specified prefix.",
    )))
    .with(AttrDef::method(documented(
        "format",
        "S.format(*args, **kwargs) -> str\n\nReturn a formatted version of S.",
    )))
    .with(receiver_free(text("maketrans", "(x, y=<unrepresentable>, z=<unrepresentable>, /)")))
    .with(AttrDef::method(text("isprintable", "($self, /)")))
    .with(AttrDef::method(text("encode", "($self, /, encoding='utf-8', errors='strict')")));

    let bytes = ClassDef::new(
        "bytes",
        Constructor::Native(new_bytes),
        SignatureSource::Broken("multiple signatures".into()),
    )
    .with(AttrDef::method(text("decode", "($self, /, encoding='utf-8', errors='strict')")))
    .with(AttrDef::method(documented(
        "hex",
        "Create a string of hexadecimal numbers from a bytes object.",
    )))
    .with(class_level(text("fromhex", "($type, string, /)")));

    vec![s, bytes]
}

fn container_classes() -> Vec<ClassDef> {
    let list = ClassDef::new("list", Constructor::Native(new_list), init(vec![optional("iterable")]))
        .with(AttrDef::method(text("append", "($self, object, /)")))
        .with(AttrDef::method(text("extend", "($self, iterable, /)")))
        .with(AttrDef::method(text("pop", "($self, index=-1, /)")))
        .with(AttrDef::method(text("sort", "($self, /, *, key=None, reverse=False)")))
        .with(AttrDef::method(text("copy", "($self, /)")))
        .with(AttrDef::method(text("clear", "($self, /)")));

    let tuple = ClassDef::new("tuple", Constructor::Native(new_tuple), init(vec![optional("iterable")]))
        .with(AttrDef::method(text("count", "($self, value, /)")))
        .with(AttrDef::method(text("index", "($self, value, start=0, stop=sys.maxsize, /)")));

    let dict = ClassDef::new(
        "dict",
        Constructor::Native(new_dict),
        SignatureSource::Broken("multiple signatures".into()),
    )
    .with(AttrDef::method(documented(
        "keys",
        "D.keys() -> a set-like object providing a view on D's keys",
    )))
    .with(AttrDef::method(documented(
        "items",
        "D.items() -> a set-like object providing a view on D's items",
    )))
    .with(AttrDef::method(text("get", "($self, key, default=None, /)")))
    .with(AttrDef::method(text("setdefault", "($self, key, default=None, /)")))
    .with(class_level(text("fromkeys", "($type, iterable, value=None, /)")));

    let set = ClassDef::new("set", Constructor::Native(new_set), init(vec![optional("iterable")]))
        .with(AttrDef::method(documented(
            "add",
            "Add an element to a set.\n\nThis has no effect if the element is already present.",
        )))
        .with(AttrDef::method(documented("union", "Return the union of sets as a new set.")))
        .with(AttrDef::method(text("issubset", "($self, other, /)")));

    let range = ClassDef::new(
        "range",
        Constructor::Native(new_range),
        init(vec![Param::new("stop", ParamKind::PositionalOnly)]),
    )
    .with(AttrDef::method(text("count", "($self, value, /)")))
    .with(AttrDef::method(text("index", "($self, value, /)")))
    .with(AttrDef::data("start", "int"))
    .with(AttrDef::data("stop", "int"))
    .with(AttrDef::data("step", "int"));

    vec![list, tuple, dict, set, range]
}

fn library_classes() -> Vec<ClassDef> {
    let exception = ClassDef::new(
        "Exception",
        Constructor::Native(new_exception),
        init(vec![Param::var_positional("args")]),
    )
    .with(AttrDef::method(text("with_traceback", "($self, tb, /)")))
    .with(AttrDef::method(text("add_note", "($self, note, /)")))
    .with(AttrDef::data("args", "tuple"));

    let ordering = ClassDef::new(
        "Ordering",
        Constructor::Enum {
            members: vec!["LESS".into(), "EQUAL".into(), "GREATER".into()],
        },
        init(vec![Param::positional("value")]),
    )
    .with(AttrDef::data("LESS", "Ordering"))
    .with(AttrDef::data("EQUAL", "Ordering"))
    .with(AttrDef::data("GREATER", "Ordering"))
    .with(AttrDef::method(structured(
        "reversed",
        Signature::new(vec![Param::positional("self")]).returns(Annotation::named("Ordering")),
    )))
    .with(class_level(structured(
        "from_int",
        Signature::new(vec![
            Param::positional("cls"),
            Param::positional("value").annotated(Annotation::named("int")),
        ])
        .returns(Annotation::named("Ordering")),
    )));

    let pair = ClassDef::new(
        "Pair",
        Constructor::Native(new_pair),
        init(vec![Param::positional("first"), Param::positional("second").with_default()]),
    )
    .with(AttrDef::method(structured(
        "swap",
        Signature::new(vec![Param::positional("self")]).returns(Annotation::named("Pair")),
    )))
    .with(class_level(structured(
        "of",
        Signature::new(vec![
            Param::positional("cls"),
            Param::positional("first").annotated(Annotation::Any),
            Param::positional("second").annotated(Annotation::Forward("'object'".into())),
        ])
        .returns(Annotation::Forward("'Pair'".into())),
    )))
    .with(receiver_free(structured(
        "describe",
        Signature::new(vec![
            Param::positional("label").annotated(Annotation::named("str")),
            Param::var_positional("parts"),
        ])
        .returns(Annotation::named("str")),
    )));

    vec![exception, ordering, pair]
}

// ============================================================================
// Functions
// ============================================================================

fn functions() -> Vec<FunctionDef> {
    vec![
        text("abs", "($module, x, /)"),
        text("len", "($module, obj, /)"),
        text("repr", "($module, obj, /)"),
        text("hash", "($module, obj, /)"),
        text("id", "($module, obj, /)"),
        text("chr", "($module, i, /)"),
        text("ord", "($module, c, /)"),
        text("callable", "($module, obj, /)"),
        text("isinstance", "($module, obj, class_or_tuple, /)"),
        FunctionDef::new("issubclass", SignatureSource::Broken("builtin method".into()))
            .with_doc("issubclass(cls, class_or_tuple, /)\n--\n\nReturn whether 'cls' is derived from another class."),
        text("divmod", "($module, x, y, /)"),
        text("round", "($module, /, number, ndigits=None)"),
        text("sorted", "($module, iterable, /, *, key=None, reverse=False)"),
        text("format", "($module, value, format_spec='', /)"),
        text("any", "($module, iterable, /)"),
        text("all", "($module, iterable, /)"),
        documented("min", "min(iterable, *[, default=obj, key=func]) -> value\nmin(arg1, arg2, *args, *[, key=func]) -> value"),
        documented("max", "max(iterable, *[, default=obj, key=func]) -> value\nmax(arg1, arg2, *args, *[, key=func]) -> value"),
        documented("getattr", "getattr(object, name[, default]) -> value\n\nGet a named attribute from an object."),
        documented("iter", "iter(iterable) -> iterator\niter(callable, sentinel) -> iterator"),
        documented("next", "next(iterator[, default])\n\nReturn the next item from the iterator."),
        documented("dir", "dir([object]) -> list of strings"),
        opaque("vars"),
        opaque("locals"),
        structured(
            "clamp",
            Signature::new(vec![
                Param::positional("value").annotated(Annotation::named("Number")),
                Param::var_positional("bounds"),
            ])
            .returns(Annotation::named("Number")),
        ),
        structured(
            "compare",
            Signature::new(vec![
                Param::positional("left").annotated(Annotation::named("int")),
                Param::positional("right").annotated(Annotation::named("int")),
            ])
            .returns(Annotation::named("Ordering")),
        ),
        text("pow", "($module, /, base, exp, mod=None)"),
        // Names the default denylist keeps out of the catalog.
        text("eval", "($module, source, globals=None, locals=None, /)"),
        text("exec", "($module, source, globals=None, locals=None, /, *, closure=None)"),
        text("compile", "($module, /, source, filename, mode, flags=0, dont_inherit=False, optimize=-1)"),
        text("open", "($module, /, file, mode='r', buffering=-1, encoding=None)"),
        text("input", "($module, prompt='', /)"),
        documented("print", "print(value, ..., sep=' ', end='\\n', file=sys.stdout, flush=False)"),
        opaque("help"),
        documented("breakpoint", "breakpoint(*args, **kws)"),
        opaque("exit"),
        opaque("quit"),
        documented("__import__", "__import__(name, globals=None, locals=None, fromlist=(), level=0) -> module"),
        opaque("__build_class__"),
    ]
}

/// Register the builtin namespace: classes, then functions, then values.
pub(super) fn register(interp: &mut Interpreter) {
    interp.define_builtin(
        "object",
        Entry::Class(Arc::new(ClassDef::new(
            "object",
            Constructor::Native(new_object),
            init(Vec::new()),
        ))),
    );
    let classes = numeric_classes()
        .into_iter()
        .chain(text_classes())
        .chain(container_classes())
        .chain(library_classes());
    for class in classes {
        let name = class.name.clone();
        interp.define_builtin(&name, Entry::Class(Arc::new(class)));
    }

    for function in functions() {
        let name = function.name.clone();
        interp.define_builtin(&name, Entry::Function(Arc::new(function)));
    }

    interp.define_builtin("None", Entry::Value(Value::None));
    interp.define_builtin("True", Entry::Value(Value::Bool(true)));
    interp.define_builtin("False", Entry::Value(Value::Bool(false)));
    interp.define_builtin("Ellipsis", Entry::Value(Value::instance("ellipsis", Vec::new())));
    interp.define_builtin(
        "NotImplemented",
        Entry::Value(Value::instance("NotImplementedType", Vec::new())),
    );
    interp.define_builtin("__debug__", Entry::Value(Value::Bool(true)));

    interp.define_hidden(ClassDef::new("NoneType", Constructor::Native(new_none), init(Vec::new())));
    interp.define_hidden(ClassDef::new("ellipsis", Constructor::Abstract, SignatureSource::Missing));
    interp.define_hidden(ClassDef::new(
        "NotImplementedType",
        Constructor::Abstract,
        SignatureSource::Missing,
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_with_no_arguments() {
        assert_eq!(new_int(&[]).unwrap(), Value::Int(0));
        assert_eq!(new_float(&[]).unwrap(), Value::Float(0.0));
        assert_eq!(new_str(&[]).unwrap(), Value::str(""));
        assert_eq!(new_list(&[]).unwrap(), Value::list(vec![]));
        assert!(new_range(&[]).is_err());
        assert!(new_pair(&[]).is_err());
    }

    #[test]
    fn test_constructors_convert() {
        assert_eq!(new_int(&[Value::str(" 42 ")]).unwrap(), Value::Int(42));
        assert_eq!(new_int(&[Value::str("ff"), Value::Int(16)]).unwrap(), Value::Int(255));
        assert_eq!(new_int(&[Value::Float(-2.7)]).unwrap(), Value::Int(-2));
        assert!(new_int(&[Value::None]).is_err());
        assert_eq!(new_set(&[Value::str("aba")]).unwrap(), new_set(&[Value::str("ba")]).unwrap());
        assert_eq!(new_range(&[Value::Int(3)]).unwrap(), Value::Range(0, 3, 1));
        assert!(new_range(&[Value::None]).is_err());
        assert_eq!(new_bytes(&[Value::Int(2)]).unwrap(), Value::Bytes(vec![0, 0].into()));
    }

    #[test]
    fn test_dict_from_pairs() {
        let pairs = Value::list(vec![Value::tuple(vec![Value::str("k"), Value::Int(1)])]);
        let dict = new_dict(&[pairs]).unwrap();
        assert_eq!(dict, Value::Dict(Arc::new(vec![(Value::str("k"), Value::Int(1))])));
        assert!(new_dict(&[Value::list(vec![Value::Int(1)])]).is_err());
    }

    #[test]
    fn test_registration_order() {
        let interp = Interpreter::new();
        let names: Vec<_> = interp.builtins.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names.first(), Some(&"object"));
        assert!(names.contains(&"Pair"));
        assert!(names.contains(&"__import__"));
        assert_eq!(names.last(), Some(&"__debug__"));
        assert_eq!(interp.hidden.len(), 3);
    }
}

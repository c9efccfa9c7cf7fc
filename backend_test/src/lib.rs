use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one and inject dependencies.
///
/// Every test gets its own server over a fresh in-memory store and stub
/// verifier. Injectable dependencies are
/// [`rocket::local::asynchronous::Client`], `crate::store::MemoryStore` and
/// `crate::verifier::StubVerifier`; the latter two share state with the server,
/// so tests can seed data and script verification outcomes.
///
/// Tests may also ask for a `mongodb::Database` or a `crate::store::MongoStore`.
/// Those connect to the configured `db_uri` under a random database name, which
/// is dropped once the test finishes. Such tests are ignored by default; run
/// them with `cargo test -- --ignored` against a MongoDB replica set.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    if !args.is_empty() {
        return syn::Error::new(
            TokenStream2::from(args).span(),
            "`backend_test` takes no arguments",
        )
        .into_compile_error()
        .into();
    }
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let (test_args, needs_db) = match check_sig(&item_fn.sig) {
        Ok(checked) => checked,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    let ignore = if needs_db {
        quote! { #[ignore = "needs a MongoDB replica set at `db_uri`"] }
    } else {
        quote! {}
    };

    quote! {
        #[test]
        #ignore
        fn #name() {
            // This test enters server code, so enable logging.
            log4rs_test_utils::test_logging::init_logging_once_for(
                ["verivote_backend"],
                None,
                None,
            );

            /// The test itself.
            #item_fn

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            let database = if #needs_db {
                Some(runtime.block_on(crate::config::test_database()))
            } else {
                None
            };

            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                runtime.block_on(async {
                    let store = crate::store::MemoryStore::default();
                    let verifier = crate::verifier::StubVerifier::default();
                    #[allow(unused_variables)]
                    let rocket_client = rocket::local::asynchronous::Client::tracked(
                        crate::test_rocket(store.clone(), verifier.clone()),
                    )
                    .await
                    .unwrap();
                    #[allow(unused_variables)]
                    let (db, mongo_store) = match &database {
                        Some((client, db)) => (
                            Some(db.clone()),
                            Some(crate::store::MongoStore::new(client.clone(), db)),
                        ),
                        None => (None, None),
                    };

                    #new_name(#(#test_args),*).await;
                })
            }));

            // Clean up the database whether or not the test passed.
            if let Some((_, db)) = database {
                runtime.block_on(db.drop(None)).unwrap();
            }
            if let Err(cause) = result {
                std::panic::resume_unwind(cause);
            }
        }
    }
    .into()
}

/// Ensure the wrapped test is async, map each parameter to the dependency it
/// asks for, and reject unknown or repeated parameters. Also reports whether
/// the test needs a real database.
fn check_sig(sig: &Signature) -> Result<(Vec<TokenStream2>, bool), syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut seen = Vec::new();
    let mut args = vec![];
    let mut needs_db = false;

    for input in &sig.inputs {
        let injected = match input {
            FnArg::Typed(pat_type) => match (&*pat_type.pat, &*pat_type.ty) {
                (Pat::Ident(_), Type::Path(type_path)) => type_path
                    .path
                    .segments
                    .last()
                    .map(|segment| segment.ident.to_string())
                    .and_then(|ty| match ty.as_str() {
                        "Client" => Some((ty, quote! { rocket_client })),
                        "MemoryStore" => Some((ty, quote! { store.clone() })),
                        "StubVerifier" => Some((ty, quote! { verifier.clone() })),
                        "Database" => Some((ty, quote! { db.clone().unwrap() })),
                        "MongoStore" => Some((ty, quote! { mongo_store.clone().unwrap() })),
                        _ => None,
                    }),
                _ => None,
            },
            FnArg::Receiver(_) => None,
        };

        let Some((ty, arg)) = injected else {
            return Err(syn::Error::new(
                input.span(),
                "Expected one of `Client`, `MemoryStore`, `StubVerifier`, `Database` or `MongoStore`",
            ));
        };
        if seen.contains(&ty) {
            return Err(syn::Error::new(
                input.span(),
                format!("Test cannot accept more than one `{ty}`"),
            ));
        }
        needs_db |= ty == "Database" || ty == "MongoStore";
        seen.push(ty);
        args.push(arg);
    }

    Ok((args, needs_db))
}

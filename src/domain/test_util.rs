use anyhow::anyhow;

/// Whether an in-memory driven port should behave as if its backing service is reachable
pub enum Connectivity {
    Connected,
    Disconnected,
}

impl Connectivity {
    pub fn blow_up_if_disconnected(&self) -> Result<(), anyhow::Error> {
        match self {
            Self::Connected => Ok(()),
            Self::Disconnected => Err(anyhow!("could not connect to service!")),
        }
    }
}

/// Stands in for one method of a mocked driving port. Every call records its arguments
/// so tests can inspect them through [FakeImplementation::calls], and hands back whatever
/// was configured ahead of time.
///
/// * [Args] is what gets captured per call, usually a tuple of owned copies of the parameters
/// * [Ret] is the method's return type
///
/// ```ignore
/// impl TodoPort for Mutex<MockTodoService> {
///     async fn delete_todo(&self, todo_id: &str, ...) -> Result<(), anyhow::Error> {
///         let mut locked_self = self.lock().expect("mock todo service mutex poisoned");
///         locked_self.delete_todo_result.save_arguments(todo_id.to_owned());
///
///         locked_self.delete_todo_result.return_value_anyhow()
///     }
/// }
/// ```
pub struct FakeImplementation<Args, Ret> {
    saved_arguments: Vec<Args>,
    return_value: Option<Ret>,
}

impl<Args, Ret> FakeImplementation<Args, Ret> {
    pub fn new() -> FakeImplementation<Args, Ret> {
        FakeImplementation {
            saved_arguments: Vec::new(),
            return_value: None,
        }
    }

    pub fn save_arguments(&mut self, arguments: Args) {
        self.saved_arguments.push(arguments)
    }

    /// Arguments of every call made so far, oldest first
    pub fn calls(&self) -> &[Args] {
        self.saved_arguments.as_slice()
    }
}

#[allow(dead_code)]
impl<Args, Ret> FakeImplementation<Args, Ret>
where
    Ret: Clone,
{
    pub fn set_return_value(&mut self, return_value: Ret) {
        self.return_value = Some(return_value)
    }

    pub fn return_value(&self) -> Ret {
        match self.return_value {
            None => panic!("Mocked method was called before its return value was set"),
            Some(ref ret_val) => ret_val.clone(),
        }
    }
}

impl<Args, Success, Fail> FakeImplementation<Args, Result<Success, Fail>>
where
    Success: Clone,
    Fail: Clone,
{
    /// Configures the [Result] to hand back. Domain error enums only implement [Clone] under
    /// test, which is enough for this.
    pub fn set_returned_result(&mut self, return_value: Result<Success, Fail>) {
        self.return_value = Some(return_value);
    }

    pub fn return_value_result(&self) -> Result<Success, Fail> {
        match self.return_value {
            Some(Ok(ref ok_result)) => Ok(ok_result.clone()),
            Some(Err(ref err)) => Err(err.clone()),
            None => panic!("Mocked method was called before its result was set"),
        }
    }
}

impl<Args, Success> FakeImplementation<Args, anyhow::Result<Success>>
where
    Success: Clone,
{
    /// Configures an [anyhow::Result] to hand back. [anyhow::Error] can't be cloned, so errors
    /// are copied by message.
    pub fn set_returned_anyhow(&mut self, return_value: anyhow::Result<Success>) {
        self.return_value = Some(return_value.map_err(|err| anyhow!(format!("{}", err))));
    }

    pub fn return_value_anyhow(&self) -> anyhow::Result<Success> {
        match self.return_value {
            None => panic!("Mocked method was called before its result was set"),
            Some(Ok(ref ok_result)) => Ok(ok_result.clone()),
            Some(Err(ref err)) => Err(anyhow!(format!("{}", err))),
        }
    }
}
